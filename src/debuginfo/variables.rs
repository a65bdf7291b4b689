//! Variable live ranges.

use std::{fmt, sync::Arc};

use strum::{Display, EnumIter, FromRepr};

/// Storage type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, FromRepr)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum VariableType {
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// Object reference
    Object,
    /// Raw address
    Address,
}

/// A source-level variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableInfo {
    /// Name in the source
    pub name: String,
    /// Storage type
    pub ty: VariableType,
    /// Local slot holding the value
    pub slot: u32,
}

impl VariableInfo {
    /// Creates a variable.
    pub fn new(name: impl Into<String>, ty: VariableType, slot: u32) -> Self {
        VariableInfo {
            name: name.into(),
            ty,
            slot,
        }
    }
}

/// The addresses over which a variable holds its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRangeInfo {
    /// The variable
    pub variable: Arc<VariableInfo>,
    /// First address of the range
    pub start_address: u32,
    /// Address just past the range
    pub end_address: u32,
}

impl VariableRangeInfo {
    /// Returns `true` if the variable is live at `address`.
    #[must_use]
    pub fn contains(&self, address: u32) -> bool {
        (self.start_address..self.end_address).contains(&address)
    }
}

impl fmt::Display for VariableRangeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:#06x}, {:#06x}) {}: {} in local {}",
            self.start_address,
            self.end_address,
            self.variable.name,
            self.variable.ty,
            self.variable.slot
        )
    }
}

/// Live ranges of all variables.
///
/// Ranges may overlap; several variables are usually live at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariablesInfo {
    ranges: Vec<VariableRangeInfo>,
}

impl VariablesInfo {
    /// Creates the table, sorting `ranges` by start address.
    pub fn new(mut ranges: Vec<VariableRangeInfo>) -> Self {
        ranges.sort_by_key(|range| (range.start_address, range.end_address));
        VariablesInfo { ranges }
    }

    /// Returns all ranges ordered by start address.
    #[must_use]
    pub fn ranges(&self) -> &[VariableRangeInfo] {
        &self.ranges
    }

    /// Returns every range live at the code-section `address`.
    #[must_use]
    pub fn find(&self, address: u32) -> Vec<&VariableRangeInfo> {
        let started = self
            .ranges
            .partition_point(|range| range.start_address <= address);
        self.ranges[..started]
            .iter()
            .filter(|range| range.end_address > address)
            .collect()
    }
}

impl fmt::Display for VariablesInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for range in &self.ranges {
            writeln!(f, "  {range}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(name: &str, start: u32, end: u32) -> VariableRangeInfo {
        VariableRangeInfo {
            variable: Arc::new(VariableInfo::new(name, VariableType::Int, 0)),
            start_address: start,
            end_address: end,
        }
    }

    #[test]
    fn test_find_returns_all_live_ranges() {
        let info = VariablesInfo::new(vec![
            range("c", 0x20, 0x30),
            range("a", 0x00, 0x40),
            range("b", 0x10, 0x20),
        ]);

        let names = |address| -> Vec<String> {
            info.find(address)
                .iter()
                .map(|r| r.variable.name.clone())
                .collect()
        };
        assert_eq!(names(0x00), vec!["a"]);
        assert_eq!(names(0x10), vec!["a", "b"]);
        assert_eq!(names(0x20), vec!["a", "c"]);
        assert!(names(0x40).is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            range("count", 4, 8).to_string(),
            "[0x0004, 0x0008) count: int in local 0"
        );
    }
}
