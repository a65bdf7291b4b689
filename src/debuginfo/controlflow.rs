//! Control-flow summaries of emitted functions.

use std::fmt;

use crate::debuginfo::{find_at_or_before, find_range};

/// A control transfer at one code address.
///
/// A call returns to the next instruction, so call entries have no explicit
/// targets. Any other entry lists every address control can continue at; an
/// empty list marks a point where the function exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFlowEntry {
    /// Code-section address of the transferring instruction
    pub address: u32,
    /// `true` for a call instruction
    pub is_call: bool,
    /// Successor addresses of a non-call entry
    pub targets: Vec<u32>,
}

impl ControlFlowEntry {
    /// Creates a call entry.
    #[must_use]
    pub fn call(address: u32) -> Self {
        ControlFlowEntry {
            address,
            is_call: true,
            targets: Vec::new(),
        }
    }

    /// Creates a branch entry.
    #[must_use]
    pub fn branch(address: u32, targets: Vec<u32>) -> Self {
        ControlFlowEntry {
            address,
            is_call: false,
            targets,
        }
    }
}

impl fmt::Display for ControlFlowEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_call {
            return write!(f, "{:#06x} call", self.address);
        }
        if self.targets.is_empty() {
            return write!(f, "{:#06x} exit", self.address);
        }
        write!(f, "{:#06x} ->", self.address)?;
        for target in &self.targets {
            write!(f, " {target:#06x}")?;
        }
        Ok(())
    }
}

/// Control-flow entries of one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionControlFlow {
    /// First address of the function
    pub start_address: u32,
    /// Address just past the function
    pub end_address: u32,
    entries: Vec<ControlFlowEntry>,
}

impl FunctionControlFlow {
    /// Creates the summary, sorting `entries` by address.
    pub fn new(start_address: u32, end_address: u32, mut entries: Vec<ControlFlowEntry>) -> Self {
        entries.sort_by_key(|entry| entry.address);
        FunctionControlFlow {
            start_address,
            end_address,
            entries,
        }
    }

    /// Returns the entries in address order.
    #[must_use]
    pub fn entries(&self) -> &[ControlFlowEntry] {
        &self.entries
    }

    /// Returns the last entry at or before `address`.
    #[must_use]
    pub fn find(&self, address: u32) -> Option<&ControlFlowEntry> {
        self.find_index(address).map(|index| &self.entries[index])
    }

    /// Returns the index of the entry [`find`](Self::find) returns.
    #[must_use]
    pub fn find_index(&self, address: u32) -> Option<usize> {
        find_at_or_before(&self.entries, address, |entry| entry.address)
    }
}

impl fmt::Display for FunctionControlFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  [{:#06x}, {:#06x})", self.start_address, self.end_address)?;
        for entry in &self.entries {
            writeln!(f, "    {entry}")?;
        }
        Ok(())
    }
}

/// Control-flow summaries of all functions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFlowInfo {
    functions: Vec<FunctionControlFlow>,
}

impl ControlFlowInfo {
    /// Creates the table, sorting `functions` by address.
    pub fn new(mut functions: Vec<FunctionControlFlow>) -> Self {
        functions.sort_by_key(|function| function.start_address);
        ControlFlowInfo { functions }
    }

    /// Returns all functions in address order.
    #[must_use]
    pub fn functions(&self) -> &[FunctionControlFlow] {
        &self.functions
    }

    /// Returns the function covering the code-section `address`.
    #[must_use]
    pub fn find(&self, address: u32) -> Option<&FunctionControlFlow> {
        find_range(&self.functions, address, |f| (f.start_address, f.end_address))
            .map(|index| &self.functions[index])
    }
}

impl fmt::Display for ControlFlowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for function in &self.functions {
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(start: u32, end: u32) -> FunctionControlFlow {
        FunctionControlFlow::new(
            start,
            end,
            vec![
                ControlFlowEntry::branch(start + 8, vec![start + 16, start]),
                ControlFlowEntry::call(start + 4),
                ControlFlowEntry::branch(start + 16, vec![]),
            ],
        )
    }

    #[test]
    fn test_entries_are_sorted() {
        let cf = function(0, 0x20);
        let addresses: Vec<u32> = cf.entries().iter().map(|e| e.address).collect();
        assert_eq!(addresses, vec![4, 8, 16]);
    }

    #[test]
    fn test_function_find_or_predecessor() {
        let cf = function(0, 0x20);
        assert!(cf.find(3).is_none());
        assert!(cf.find(4).unwrap().is_call);
        assert_eq!(cf.find(7).unwrap().address, 4);
        assert_eq!(cf.find(8).unwrap().targets, vec![16, 0]);
        assert_eq!(cf.find(0x1f).unwrap().address, 16);
    }

    #[test]
    fn test_info_find_by_end_address() {
        let info = ControlFlowInfo::new(vec![function(0x20, 0x40), function(0, 0x20)]);
        assert_eq!(info.find(0).unwrap().start_address, 0);
        assert_eq!(info.find(0x20).unwrap().start_address, 0x20);
        assert!(info.find(0x40).is_none());
    }

    #[test]
    fn test_display() {
        let text = function(0, 0x20).to_string();
        assert!(text.contains("0x0004 call"));
        assert!(text.contains("0x0008 -> 0x0010 0x0000"));
        assert!(text.contains("0x0010 exit"));
    }
}
