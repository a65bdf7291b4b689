//! Emission-time construction of [`DebugInfo`].
//!
//! The code emitter reports, in address order, where each function starts
//! and ends, which source position each instruction came from, where inlined
//! code begins and ends, and which instructions call or branch. The builder
//! turns this into compact tables:
//!
//! - files and methods are interned once
//! - a position is only recorded when it differs from the current one, as a
//!   `Line` command when only the line changed and a `File` command otherwise
//! - addresses are checked to never go backwards
//!
//! All addresses passed to the builder are relative to the code section.

use std::{collections::HashMap, sync::Arc};

use crate::{
    debuginfo::{
        ClassLayoutInfo, ControlFlowEntry, ControlFlowInfo, DebugInfo, FileInfo,
        FunctionControlFlow, LineInfo, LineInfoCommand, LineInfoSequence, MethodInfo, TypeLayout,
        VariableInfo, VariableRangeInfo, VariableType, VariablesInfo,
    },
    Result,
};

#[derive(Clone, Default)]
struct Position {
    file: Option<Arc<FileInfo>>,
    line: u32,
}

struct OpenFunction {
    method: Arc<MethodInfo>,
    start: u32,
    last_address: u32,
    commands: Vec<LineInfoCommand>,
    entries: Vec<ControlFlowEntry>,
    position: Position,
    callers: Vec<Position>,
    /// Set after an exit: the restored position has not been written yet.
    restore_pending: bool,
}

/// Builder for [`DebugInfo`].
pub struct DebugInfoBuilder {
    code_section_offset: u32,
    files: Vec<Arc<FileInfo>>,
    file_index: HashMap<String, usize>,
    methods: Vec<Arc<MethodInfo>>,
    method_index: HashMap<(String, String), usize>,
    sequences: Vec<LineInfoSequence>,
    functions: Vec<FunctionControlFlow>,
    variables: Vec<VariableRangeInfo>,
    layouts: Vec<TypeLayout>,
    current: Option<OpenFunction>,
    code_end: u32,
}

impl DebugInfoBuilder {
    /// Creates a builder for a code section starting at `code_section_offset`.
    #[must_use]
    pub fn new(code_section_offset: u32) -> Self {
        DebugInfoBuilder {
            code_section_offset,
            files: Vec::new(),
            file_index: HashMap::new(),
            methods: Vec::new(),
            method_index: HashMap::new(),
            sequences: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
            layouts: Vec::new(),
            current: None,
            code_end: 0,
        }
    }

    /// Interns a source file.
    pub fn file(&mut self, name: &str) -> Arc<FileInfo> {
        if let Some(&index) = self.file_index.get(name) {
            return self.files[index].clone();
        }
        let file = Arc::new(FileInfo::new(name));
        self.file_index.insert(name.to_string(), self.files.len());
        self.files.push(file.clone());
        file
    }

    /// Interns a method.
    pub fn method(&mut self, class_name: &str, name: &str) -> Arc<MethodInfo> {
        let key = (class_name.to_string(), name.to_string());
        if let Some(&index) = self.method_index.get(&key) {
            return self.methods[index].clone();
        }
        let method = Arc::new(MethodInfo::new(class_name, name));
        self.method_index.insert(key, self.methods.len());
        self.methods.push(method.clone());
        method
    }

    /// Starts the code of a function at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a function is still open or
    /// `address` lies before the end of the previous function.
    pub fn start_function(&mut self, class_name: &str, name: &str, address: u32) -> Result<()> {
        if let Some(open) = &self.current {
            return Err(malformed_error!(
                "function {} starts while {} is still open",
                name,
                open.method
            ));
        }
        if address < self.code_end {
            return Err(malformed_error!(
                "function {} starts at {:#x}, before the previous end {:#x}",
                name,
                address,
                self.code_end
            ));
        }
        let method = self.method(class_name, name);
        self.current = Some(OpenFunction {
            method,
            start: address,
            last_address: address,
            commands: Vec::new(),
            entries: Vec::new(),
            position: Position::default(),
            callers: Vec::new(),
            restore_pending: false,
        });
        Ok(())
    }

    /// Records that the code from `address` on comes from `file:line`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] outside a function or when
    /// `address` goes backwards.
    pub fn location(&mut self, address: u32, file: &str, line: u32) -> Result<()> {
        let file = self.file(file);
        let open = self.open_at(address)?;

        let same_file = open.position.file.as_ref() == Some(&file);
        let command = if !same_file {
            Some(LineInfoCommand::File {
                address,
                file: file.clone(),
                line,
            })
        } else if open.position.line != line || open.restore_pending {
            Some(LineInfoCommand::Line { address, line })
        } else {
            None
        };

        if let Some(command) = command {
            open.commands.push(command);
            open.position = Position {
                file: Some(file),
                line,
            };
            open.restore_pending = false;
        }
        Ok(())
    }

    /// Records that code of `class_name.name` inlined at the current position
    /// starts at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] outside a function or when
    /// `address` goes backwards.
    pub fn enter_inlined(&mut self, address: u32, class_name: &str, name: &str) -> Result<()> {
        let method = self.method(class_name, name);
        let open = self.open_at(address)?;
        open.commands
            .push(LineInfoCommand::EnterMethod { address, method });
        let caller = std::mem::take(&mut open.position);
        open.callers.push(caller);
        open.restore_pending = false;
        Ok(())
    }

    /// Records that the innermost inlined code ends at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] outside a function, when `address`
    /// goes backwards, or when no inlined code is open.
    pub fn exit_inlined(&mut self, address: u32) -> Result<()> {
        let open = self.open_at(address)?;
        let Some(caller) = open.callers.pop() else {
            return Err(malformed_error!(
                "exit at {:#x} without inlined code in {}",
                address,
                open.method
            ));
        };
        open.commands.push(LineInfoCommand::ExitMethod { address });
        open.position = caller;
        open.restore_pending = true;
        Ok(())
    }

    /// Records a call instruction at `address`.
    ///
    /// # Errors
    ///
    /// See [`branch`](Self::branch).
    pub fn call(&mut self, address: u32) -> Result<()> {
        self.control_flow(ControlFlowEntry::call(address))
    }

    /// Records an instruction at `address` that continues at `targets`.
    ///
    /// An empty `targets` list marks an exit from the function.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] outside a function, when `address`
    /// goes backwards, or when another entry was already recorded at
    /// `address`.
    pub fn branch(&mut self, address: u32, targets: &[u32]) -> Result<()> {
        self.control_flow(ControlFlowEntry::branch(address, targets.to_vec()))
    }

    fn control_flow(&mut self, entry: ControlFlowEntry) -> Result<()> {
        let open = self.open_at(entry.address)?;
        if let Some(last) = open.entries.last() {
            if last.address >= entry.address {
                return Err(malformed_error!(
                    "control-flow entry at {:#x} does not follow {:#x}",
                    entry.address,
                    last.address
                ));
            }
        }
        open.entries.push(entry);
        Ok(())
    }

    /// Ends the current function; `address` is just past its last byte.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if no function is open, inlined
    /// code is still open, the function would be empty, or a branch targets
    /// an address outside the function.
    pub fn end_function(&mut self, address: u32) -> Result<()> {
        let Some(open) = self.current.take() else {
            return Err(malformed_error!("end at {:#x} outside of a function", address));
        };
        if address <= open.start || address < open.last_address {
            return Err(malformed_error!(
                "function {} ends at {:#x}, not after its code",
                open.method,
                address
            ));
        }
        if !open.callers.is_empty() {
            return Err(malformed_error!(
                "function {} ends inside {} inlined methods",
                open.method,
                open.callers.len()
            ));
        }
        let range = open.start..address;
        if let Some(target) = open
            .entries
            .iter()
            .flat_map(|entry| entry.targets.iter())
            .find(|target| !range.contains(target))
        {
            return Err(malformed_error!(
                "branch target {:#x} lies outside {}",
                target,
                open.method
            ));
        }

        self.sequences.push(LineInfoSequence::new(
            open.start,
            address,
            open.method,
            open.commands,
        ));
        self.functions
            .push(FunctionControlFlow::new(open.start, address, open.entries));
        self.code_end = address;
        Ok(())
    }

    /// Records that variable `name` lives in local `slot` over
    /// `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the range is empty.
    pub fn variable(
        &mut self,
        name: &str,
        ty: VariableType,
        slot: u32,
        start: u32,
        end: u32,
    ) -> Result<()> {
        if start >= end {
            return Err(malformed_error!(
                "empty range [{:#x}, {:#x}) for variable {}",
                start,
                end,
                name
            ));
        }
        self.variables.push(VariableRangeInfo {
            variable: Arc::new(VariableInfo::new(name, ty, slot)),
            start_address: start,
            end_address: end,
        });
        Ok(())
    }

    /// Adds a type layout and returns its index.
    pub fn layout(&mut self, layout: TypeLayout) -> usize {
        self.layouts.push(layout);
        self.layouts.len() - 1
    }

    /// Finishes the tables.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a function is still open or the
    /// type layouts reference each other inconsistently.
    pub fn build(self) -> Result<DebugInfo> {
        if let Some(open) = &self.current {
            return Err(malformed_error!("function {} was never ended", open.method));
        }
        Ok(DebugInfo {
            code_section_offset: self.code_section_offset,
            files: self.files,
            methods: self.methods,
            line_info: LineInfo::new(self.sequences),
            control_flow: ControlFlowInfo::new(self.functions),
            variables: VariablesInfo::new(self.variables),
            class_layouts: ClassLayoutInfo::new(self.layouts)?,
        })
    }

    fn open_at(&mut self, address: u32) -> Result<&mut OpenFunction> {
        let Some(open) = self.current.as_mut() else {
            return Err(malformed_error!("address {:#x} outside of a function", address));
        };
        if address < open.last_address {
            return Err(malformed_error!(
                "address {:#x} goes back before {:#x} in {}",
                address,
                open.last_address,
                open.method
            ));
        }
        open.last_address = address;
        Ok(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_minimizes_commands() {
        let mut b = DebugInfoBuilder::new(0);
        b.start_function("demo.Main", "main", 0).unwrap();
        b.location(0, "Main.java", 1).unwrap();
        b.location(2, "Main.java", 1).unwrap();
        b.location(4, "Main.java", 2).unwrap();
        b.location(6, "Util.java", 2).unwrap();
        b.end_function(8).unwrap();
        let info = b.build().unwrap();

        let commands = &info.line_info.sequences()[0].commands;
        assert_eq!(commands.len(), 3);
        assert!(matches!(commands[0], LineInfoCommand::File { address: 0, line: 1, .. }));
        assert!(matches!(commands[1], LineInfoCommand::Line { address: 4, line: 2 }));
        assert!(matches!(commands[2], LineInfoCommand::File { address: 6, line: 2, .. }));
        assert_eq!(info.files.len(), 2);
    }

    #[test]
    fn test_inlined_code_restores_caller() {
        let mut b = DebugInfoBuilder::new(0);
        b.start_function("demo.Main", "main", 0).unwrap();
        b.location(0, "Main.java", 10).unwrap();
        b.enter_inlined(4, "demo.Util", "twice").unwrap();
        b.location(4, "Util.java", 3).unwrap();
        b.exit_inlined(8).unwrap();
        // Same position as before the call, still written after the exit.
        b.location(8, "Main.java", 10).unwrap();
        b.end_function(12).unwrap();
        let info = b.build().unwrap();

        let unpacked = info.line_info.sequences()[0].unpack();
        let lines: Vec<(u32, u32, usize)> = unpacked
            .locations
            .iter()
            .map(|l| (l.address, l.location.line, l.location.depth()))
            .collect();
        assert_eq!(lines, vec![(0, 10, 0), (4, 3, 1), (8, 10, 0)]);
        assert_eq!(info.methods.len(), 2);
    }

    #[test]
    fn test_rejects_out_of_order_input() {
        let mut b = DebugInfoBuilder::new(0);
        assert!(matches!(b.location(0, "A.java", 1), Err(Error::Malformed { .. })));
        b.start_function("demo.Main", "main", 0x10).unwrap();
        assert!(b.start_function("demo.Main", "other", 0x20).is_err());
        b.location(0x14, "A.java", 1).unwrap();
        assert!(b.location(0x12, "A.java", 2).is_err());
        assert!(b.exit_inlined(0x14).is_err());
        b.call(0x16).unwrap();
        assert!(b.call(0x16).is_err());
        b.branch(0x18, &[0x40]).unwrap();
        assert!(b.end_function(0x20).is_err());
    }

    #[test]
    fn test_functions_do_not_overlap() {
        let mut b = DebugInfoBuilder::new(0);
        b.start_function("demo.Main", "a", 0).unwrap();
        b.branch(4, &[]).unwrap();
        b.end_function(8).unwrap();
        assert!(b.start_function("demo.Main", "b", 4).is_err());
        b.start_function("demo.Main", "b", 8).unwrap();
        assert!(b.build().is_err());
    }

    #[test]
    fn test_variables_and_layouts() {
        let mut b = DebugInfoBuilder::new(0x400);
        assert!(b.variable("i", VariableType::Int, 1, 8, 8).is_err());
        b.variable("i", VariableType::Int, 1, 8, 16).unwrap();
        let index = b.layout(TypeLayout::Unknown { address: 0x80 });
        assert_eq!(index, 0);
        let info = b.build().unwrap();

        assert_eq!(info.variables_at(0x40c).len(), 1);
        assert!(info.variables_at(0x410).is_empty());
        assert!(info.class_layouts.find_by_address(0x80).is_some());
    }
}
