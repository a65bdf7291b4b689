//! Debug information for emitted code.
//!
//! While code is emitted, a [`DebugInfoBuilder`] records which source position
//! every code address came from, how control flows between addresses, which
//! variables are live where, and how types are laid out in memory. The result
//! is an immutable [`DebugInfo`] that is serialized next to the code and
//! queried later by a debugger.
//!
//! # Key Components
//!
//! - [`LineInfo`] - Line tables, one [`LineInfoSequence`] per function
//! - [`ControlFlowInfo`] - Branch and call edges, one [`FunctionControlFlow`] per function
//! - [`VariablesInfo`] - Live ranges of variables
//! - [`ClassLayoutInfo`] - Memory layout of types
//! - [`StepLocationsFinder`] - Where to stop next when stepping
//!
//! # Addresses
//!
//! Every table stores addresses relative to the start of the code section.
//! The query methods of [`DebugInfo`] take absolute addresses and subtract
//! [`DebugInfo::code_section_offset`] themselves; the tables' own `find`
//! methods take relative addresses.
//!
//! # Thread Safety
//!
//! A built [`DebugInfo`] is never mutated and can be shared between threads.
//! A [`StepLocationsFinder`] keeps scratch state and belongs to one thread.
//!
//! # Examples
//!
//! ```rust
//! use optiscope::debuginfo::{DebugInfo, DebugInfoBuilder};
//!
//! let mut builder = DebugInfoBuilder::new(0x100);
//! builder.start_function("demo.Main", "run", 0x00)?;
//! builder.location(0x00, "Main.java", 3)?;
//! builder.location(0x08, "Main.java", 4)?;
//! builder.end_function(0x10)?;
//! let info = builder.build()?;
//!
//! let location = info.location(0x108).unwrap();
//! assert_eq!(location.line, 4);
//!
//! let mut bytes = Vec::new();
//! info.write_to(&mut bytes)?;
//! assert_eq!(DebugInfo::read(&bytes)?, info);
//! # Ok::<(), optiscope::Error>(())
//! ```

mod builder;
mod codec;
mod controlflow;
mod layout;
mod lines;
mod step;
mod variables;

use std::{fmt, io, sync::Arc};

pub use builder::DebugInfoBuilder;
pub use controlflow::{ControlFlowEntry, ControlFlowInfo, FunctionControlFlow};
pub use layout::{ClassLayout, ClassLayoutInfo, FieldInfo, FieldType, PrimitiveKind, TypeLayout};
pub use lines::{
    InliningLocation, InstructionLocation, LineInfo, LineInfoCommand, LineInfoSequence,
    LineInfoUnpackedSequence, Location,
};
pub use step::{StepLocations, StepLocationsFinder};
pub use variables::{VariableInfo, VariableRangeInfo, VariableType, VariablesInfo};

use crate::Result;

/// A source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileInfo {
    /// Path of the file as the compiler saw it
    pub name: String,
}

impl FileInfo {
    /// Creates a file entry.
    pub fn new(name: impl Into<String>) -> Self {
        FileInfo { name: name.into() }
    }
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A method that code was generated for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodInfo {
    /// Fully qualified name of the declaring class
    pub class_name: String,
    /// Simple name of the method
    pub name: String,
}

impl MethodInfo {
    /// Creates a method entry.
    pub fn new(class_name: impl Into<String>, name: impl Into<String>) -> Self {
        MethodInfo {
            class_name: class_name.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.name)
    }
}

/// All debug information of one code section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugInfo {
    /// Absolute address of the first byte of the code section
    pub code_section_offset: u32,
    /// Interned source files
    pub files: Vec<Arc<FileInfo>>,
    /// Interned methods
    pub methods: Vec<Arc<MethodInfo>>,
    /// Address to source position mapping
    pub line_info: LineInfo,
    /// Branch and call edges
    pub control_flow: ControlFlowInfo,
    /// Variable live ranges
    pub variables: VariablesInfo,
    /// Type layouts
    pub class_layouts: ClassLayoutInfo,
}

impl DebugInfo {
    /// Converts an absolute address into a code-section address.
    #[must_use]
    pub fn relative(&self, address: u32) -> Option<u32> {
        address.checked_sub(self.code_section_offset)
    }

    /// Converts a code-section address into an absolute address.
    #[must_use]
    pub fn absolute(&self, address: u32) -> u32 {
        address.saturating_add(self.code_section_offset)
    }

    /// Returns the line sequence of the function covering `address`.
    #[must_use]
    pub fn line_sequence(&self, address: u32) -> Option<&LineInfoSequence> {
        self.line_info.find(self.relative(address)?)
    }

    /// Returns the source position of the code at `address`.
    #[must_use]
    pub fn location(&self, address: u32) -> Option<Location> {
        let relative = self.relative(address)?;
        let unpacked = self.line_info.find(relative)?.unpack();
        unpacked.find(relative).map(|found| found.location.clone())
    }

    /// Returns the control-flow summary of the function covering `address`.
    #[must_use]
    pub fn function_control_flow(&self, address: u32) -> Option<&FunctionControlFlow> {
        self.control_flow.find(self.relative(address)?)
    }

    /// Returns every variable live at `address`.
    #[must_use]
    pub fn variables_at(&self, address: u32) -> Vec<&VariableRangeInfo> {
        self.relative(address)
            .map(|relative| self.variables.find(relative))
            .unwrap_or_default()
    }

    /// Writes a human-readable rendering of every table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if writing to `out` fails.
    pub fn dump(&self, mut out: impl io::Write) -> Result<()> {
        write!(out, "{self}")?;
        Ok(())
    }
}

impl fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "code section at {:#x}", self.code_section_offset)?;
        writeln!(f, "files:")?;
        for (index, file) in self.files.iter().enumerate() {
            writeln!(f, "  #{index} {file}")?;
        }
        writeln!(f, "methods:")?;
        for (index, method) in self.methods.iter().enumerate() {
            writeln!(f, "  #{index} {method}")?;
        }
        writeln!(f, "lines:")?;
        write!(f, "{}", self.line_info)?;
        writeln!(f, "control flow:")?;
        write!(f, "{}", self.control_flow)?;
        writeln!(f, "variables:")?;
        write!(f, "{}", self.variables)?;
        writeln!(f, "layouts:")?;
        write!(f, "{}", self.class_layouts)
    }
}

/// Finds the range covering `address` in ranges sorted by address.
///
/// Ranges are half-open. The search runs on end addresses, so `address`
/// equal to the end of one range lands in the next one when they touch.
pub(crate) fn find_range<T>(
    items: &[T],
    address: u32,
    bounds: impl Fn(&T) -> (u32, u32),
) -> Option<usize> {
    let index = items.partition_point(|item| bounds(item).1 <= address);
    let item = items.get(index)?;
    (bounds(item).0 <= address).then_some(index)
}

/// Finds the last item at or before `address` in items sorted by address.
pub(crate) fn find_at_or_before<T>(
    items: &[T],
    address: u32,
    address_of: impl Fn(&T) -> u32,
) -> Option<usize> {
    items
        .partition_point(|item| address_of(item) <= address)
        .checked_sub(1)
}
