//! Memory layout of types, for inspecting values in a paused program.
//!
//! Every type the runtime knows has a class structure at a fixed address.
//! A debugger reads the class pointer of an object, looks the structure up
//! with [`ClassLayoutInfo::find_by_address`] and decodes the object's fields
//! with the offsets recorded here.

use std::{collections::HashMap, fmt};

use strum::{Display, EnumIter, FromRepr};

use crate::Result;

/// Primitive value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, FromRepr)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum PrimitiveKind {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `short`
    Short,
    /// `char`
    Char,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
}

impl PrimitiveKind {
    /// Returns the size of a value in bytes.
    #[must_use]
    pub fn size(self) -> u32 {
        match self {
            PrimitiveKind::Boolean | PrimitiveKind::Byte => 1,
            PrimitiveKind::Short | PrimitiveKind::Char => 2,
            PrimitiveKind::Int | PrimitiveKind::Float => 4,
            PrimitiveKind::Long | PrimitiveKind::Double => 8,
        }
    }
}

/// Type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// A primitive value
    Primitive(PrimitiveKind),
    /// An object reference
    Object,
    /// A raw address
    Address,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Primitive(kind) => write!(f, "{kind}"),
            FieldType::Object => f.write_str("object"),
            FieldType::Address => f.write_str("address"),
        }
    }
}

/// A field and where it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Byte offset from the object start, or the absolute address of a
    /// static field
    pub offset: u32,
    /// Field type
    pub ty: FieldType,
}

impl FieldInfo {
    /// Creates a field.
    pub fn new(name: impl Into<String>, offset: u32, ty: FieldType) -> Self {
        FieldInfo {
            name: name.into(),
            offset,
            ty,
        }
    }
}

/// Layout of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLayout {
    /// Fully qualified name
    pub name: String,
    /// Address of the class structure
    pub address: u32,
    /// Instance size in bytes
    pub size: u32,
    /// Index of the superclass layout
    pub super_class: Option<usize>,
    /// Instance fields declared by this class
    pub fields: Vec<FieldInfo>,
    /// Static fields declared by this class
    pub static_fields: Vec<FieldInfo>,
}

/// Layout of one runtime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeLayout {
    /// A class with fields
    Class(ClassLayout),
    /// An interface
    Interface {
        /// Fully qualified name
        name: String,
        /// Address of the class structure
        address: u32,
    },
    /// An array type
    Array {
        /// Address of the class structure
        address: u32,
        /// Index of the element type layout
        element: usize,
    },
    /// A primitive type
    Primitive {
        /// Which primitive
        kind: PrimitiveKind,
        /// Address of the class structure
        address: u32,
    },
    /// A type the compiler knows nothing more about
    Unknown {
        /// Address of the class structure
        address: u32,
    },
}

impl TypeLayout {
    /// Returns the address of the class structure.
    #[must_use]
    pub fn address(&self) -> u32 {
        match self {
            TypeLayout::Class(class) => class.address,
            TypeLayout::Interface { address, .. }
            | TypeLayout::Array { address, .. }
            | TypeLayout::Primitive { address, .. }
            | TypeLayout::Unknown { address } => *address,
        }
    }

    /// Returns the name classes and interfaces are looked up by.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeLayout::Class(class) => Some(&class.name),
            TypeLayout::Interface { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Layouts of all runtime types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassLayoutInfo {
    layouts: Vec<TypeLayout>,
    by_name: HashMap<String, usize>,
    by_address: Vec<(u32, usize)>,
}

impl ClassLayoutInfo {
    /// Creates the table and its lookup indices.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a superclass or element index is
    /// out of range, a superclass is not a class, or two types share a class
    /// structure address.
    pub fn new(layouts: Vec<TypeLayout>) -> Result<Self> {
        let count = layouts.len();
        let mut by_name = HashMap::new();
        let mut by_address = Vec::with_capacity(count);

        for (index, layout) in layouts.iter().enumerate() {
            match layout {
                TypeLayout::Class(ClassLayout {
                    super_class: Some(parent),
                    name,
                    ..
                }) => match layouts.get(*parent) {
                    Some(TypeLayout::Class(_)) => {}
                    _ => {
                        return Err(malformed_error!(
                            "superclass #{} of {} is not a class layout",
                            parent,
                            name
                        ))
                    }
                },
                TypeLayout::Array { element, .. } if *element >= count => {
                    return Err(malformed_error!(
                        "array layout #{} has element #{} of {}",
                        index,
                        element,
                        count
                    ))
                }
                _ => {}
            }
            if let Some(name) = layout.name() {
                by_name.insert(name.to_string(), index);
            }
            by_address.push((layout.address(), index));
        }

        by_address.sort_unstable();
        if let Some(pair) = by_address.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(malformed_error!(
                "layouts #{} and #{} share address {:#x}",
                pair[0].1,
                pair[1].1,
                pair[0].0
            ));
        }

        Ok(ClassLayoutInfo {
            layouts,
            by_name,
            by_address,
        })
    }

    /// Returns all layouts in index order.
    #[must_use]
    pub fn layouts(&self) -> &[TypeLayout] {
        &self.layouts
    }

    /// Returns the layout at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TypeLayout> {
        self.layouts.get(index)
    }

    /// Returns the class or interface named `name`.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&TypeLayout> {
        self.by_name.get(name).map(|&index| &self.layouts[index])
    }

    /// Returns the type whose class structure is at `address`.
    #[must_use]
    pub fn find_by_address(&self, address: u32) -> Option<&TypeLayout> {
        self.by_address
            .binary_search_by_key(&address, |&(address, _)| address)
            .ok()
            .map(|slot| &self.layouts[self.by_address[slot].1])
    }

    /// Returns the instance fields of the class at `index`, inherited ones
    /// first.
    #[must_use]
    pub fn instance_fields(&self, index: usize) -> Vec<&FieldInfo> {
        let mut chain = Vec::new();
        let mut current = Some(index);
        // Bounded by the table size so a cyclic hierarchy cannot hang.
        while let Some(TypeLayout::Class(class)) = current.and_then(|i| self.layouts.get(i)) {
            if chain.len() == self.layouts.len() {
                break;
            }
            chain.push(class);
            current = class.super_class;
        }
        chain
            .iter()
            .rev()
            .flat_map(|class| class.fields.iter())
            .collect()
    }
}

impl fmt::Display for TypeLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeLayout::Class(class) => {
                write!(f, "class {} @{:#x} size {}", class.name, class.address, class.size)?;
                if let Some(parent) = class.super_class {
                    write!(f, " extends #{parent}")?;
                }
                for field in &class.fields {
                    write!(f, "\n    +{} {}: {}", field.offset, field.name, field.ty)?;
                }
                for field in &class.static_fields {
                    write!(f, "\n    static @{:#x} {}: {}", field.offset, field.name, field.ty)?;
                }
                Ok(())
            }
            TypeLayout::Interface { name, address } => write!(f, "interface {name} @{address:#x}"),
            TypeLayout::Array { address, element } => write!(f, "array of #{element} @{address:#x}"),
            TypeLayout::Primitive { kind, address } => write!(f, "primitive {kind} @{address:#x}"),
            TypeLayout::Unknown { address } => write!(f, "unknown @{address:#x}"),
        }
    }
}

impl fmt::Display for ClassLayoutInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, layout) in self.layouts.iter().enumerate() {
            writeln!(f, "  #{index} {layout}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, address: u32, super_class: Option<usize>, fields: &[&str]) -> TypeLayout {
        TypeLayout::Class(ClassLayout {
            name: name.to_string(),
            address,
            size: 8 + 4 * fields.len() as u32,
            super_class,
            fields: fields
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    FieldInfo::new(*name, 8 + 4 * i as u32, FieldType::Primitive(PrimitiveKind::Int))
                })
                .collect(),
            static_fields: Vec::new(),
        })
    }

    fn sample() -> ClassLayoutInfo {
        ClassLayoutInfo::new(vec![
            class("java.lang.Object", 0x100, None, &[]),
            class("demo.Point", 0x140, Some(0), &["x", "y"]),
            class("demo.Point3", 0x180, Some(1), &["z"]),
            TypeLayout::Primitive {
                kind: PrimitiveKind::Int,
                address: 0x10,
            },
            TypeLayout::Array {
                address: 0x20,
                element: 3,
            },
            TypeLayout::Interface {
                name: "demo.Shape".to_string(),
                address: 0x1c0,
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_lookup_by_name_and_address() {
        let info = sample();
        assert_eq!(info.find_by_name("demo.Point").unwrap().address(), 0x140);
        assert!(info.find_by_name("int").is_none());
        assert_eq!(
            info.find_by_address(0x20),
            Some(&TypeLayout::Array {
                address: 0x20,
                element: 3
            })
        );
        assert!(info.find_by_address(0x21).is_none());
        assert_eq!(info.find_by_address(0x1c0).unwrap().name(), Some("demo.Shape"));
    }

    #[test]
    fn test_instance_fields_include_inherited() {
        let info = sample();
        let names: Vec<&str> = info
            .instance_fields(2)
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["x", "y", "z"]);
        assert!(info.instance_fields(3).is_empty());
    }

    #[test]
    fn test_rejects_bad_references() {
        assert!(ClassLayoutInfo::new(vec![class("A", 0x10, Some(5), &[])]).is_err());
        assert!(ClassLayoutInfo::new(vec![TypeLayout::Array {
            address: 0,
            element: 1
        }])
        .is_err());
        assert!(ClassLayoutInfo::new(vec![
            TypeLayout::Unknown { address: 4 },
            TypeLayout::Unknown { address: 4 },
        ])
        .is_err());
    }

    #[test]
    fn test_primitive_sizes() {
        assert_eq!(PrimitiveKind::Boolean.size(), 1);
        assert_eq!(PrimitiveKind::Char.size(), 2);
        assert_eq!(PrimitiveKind::Float.size(), 4);
        assert_eq!(PrimitiveKind::Long.size(), 8);
        assert_eq!(PrimitiveKind::Double.to_string(), "double");
    }

    #[test]
    fn test_display() {
        let text = sample().to_string();
        assert!(text.contains("#1 class demo.Point @0x140 size 16 extends #0"));
        assert!(text.contains("+8 x: int"));
        assert!(text.contains("#4 array of #3 @0x20"));
    }
}
