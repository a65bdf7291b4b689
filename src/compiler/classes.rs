//! Lookup of call targets by class name.
//!
//! Inlining and the interpreter resolve [`MethodRef`]s through the
//! [`ClassSource`] trait. [`ClassRepository`] is the concurrent in-memory
//! implementation that front ends fill and passes read.

use std::sync::Arc;

use bitflags::bitflags;
use dashmap::DashMap;

use crate::ir::{MethodRef, Program};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Method modifiers relevant to optimization
    pub struct MethodModifiers: u32 {
        /// Method has no receiver instance
        const STATIC = 0x0008;
        /// Method holds the receiver's monitor while it runs
        const SYNCHRONIZED = 0x0020;
        /// Method is implemented outside the program
        const NATIVE = 0x0100;
        /// Method is declared without an implementation
        const ABSTRACT = 0x0400;
    }
}

/// A method and, when it has one, its body.
#[derive(Debug, Clone)]
pub struct MethodModel {
    /// The method's identity
    pub reference: MethodRef,
    /// Declared modifiers
    pub modifiers: MethodModifiers,
    /// Body, absent for abstract and native methods
    pub program: Option<Program>,
}

impl MethodModel {
    /// Creates a method with a body.
    pub fn new(reference: MethodRef, modifiers: MethodModifiers, program: Program) -> Self {
        MethodModel {
            reference,
            modifiers,
            program: Some(program),
        }
    }

    /// Creates a method without a body.
    pub fn declaration(reference: MethodRef, modifiers: MethodModifiers) -> Self {
        MethodModel {
            reference,
            modifiers,
            program: None,
        }
    }

    /// Returns the body if the method can be executed or inlined.
    #[must_use]
    pub fn body(&self) -> Option<&Program> {
        if self
            .modifiers
            .intersects(MethodModifiers::ABSTRACT | MethodModifiers::NATIVE)
        {
            return None;
        }
        self.program.as_ref()
    }
}

/// A class with its methods.
#[derive(Debug, Clone)]
pub struct ClassModel {
    /// Fully qualified name
    pub name: String,
    /// Declared methods
    pub methods: Vec<Arc<MethodModel>>,
}

impl ClassModel {
    /// Creates a class without methods.
    pub fn new(name: impl Into<String>) -> Self {
        ClassModel {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Adds a method and returns `self`.
    #[must_use]
    pub fn with_method(mut self, method: MethodModel) -> Self {
        self.methods.push(Arc::new(method));
        self
    }

    /// Finds a method by name and descriptor.
    #[must_use]
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&Arc<MethodModel>> {
        self.methods
            .iter()
            .find(|m| m.reference.name == name && m.reference.descriptor == descriptor)
    }
}

/// Resolves classes by fully qualified name.
pub trait ClassSource: Send + Sync {
    /// Returns the class named `name`, if known.
    fn class(&self, name: &str) -> Option<Arc<ClassModel>>;

    /// Returns the method named by `method`, if its class is known and
    /// declares it.
    fn method(&self, method: &MethodRef) -> Option<Arc<MethodModel>> {
        self.class(&method.class_name)?
            .method(&method.name, &method.descriptor)
            .cloned()
    }
}

/// Thread-safe in-memory [`ClassSource`].
#[derive(Debug, Default)]
pub struct ClassRepository {
    classes: DashMap<String, Arc<ClassModel>>,
}

impl ClassRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a class.
    pub fn insert(&self, class: ClassModel) {
        self.classes.insert(class.name.clone(), Arc::new(class));
    }

    /// Returns the number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns `true` if no class was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassSource for ClassRepository {
    fn class(&self, name: &str) -> Option<Arc<ClassModel>> {
        self.classes.get(name).map(|entry| Arc::clone(entry.value()))
    }
}
