//! Line tables.
//!
//! A [`LineInfoSequence`] describes one function as a stream of commands.
//! Replaying the stream yields the source position of every address where
//! the position changes. Inlined code is bracketed by enter/exit commands,
//! which is how a location knows the call chain it was inlined through.

use std::{fmt, sync::Arc};

use crate::debuginfo::{find_at_or_before, find_range, FileInfo, MethodInfo};

/// One step of a line-table command stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineInfoCommand {
    /// Code of `method` inlined at the current position starts here.
    EnterMethod {
        /// Address of the first inlined instruction
        address: u32,
        /// The inlined method
        method: Arc<MethodInfo>,
    },
    /// The innermost inlined method ends here.
    ExitMethod {
        /// Address of the first instruction after the inlined code
        address: u32,
    },
    /// Switches to another file and line.
    File {
        /// Address of the first instruction at the new position
        address: u32,
        /// The new file
        file: Arc<FileInfo>,
        /// The new line
        line: u32,
    },
    /// Switches to another line of the current file.
    Line {
        /// Address of the first instruction at the new position
        address: u32,
        /// The new line
        line: u32,
    },
}

impl LineInfoCommand {
    /// Returns the address the command takes effect at.
    #[must_use]
    pub fn address(&self) -> u32 {
        match self {
            LineInfoCommand::EnterMethod { address, .. }
            | LineInfoCommand::ExitMethod { address }
            | LineInfoCommand::File { address, .. }
            | LineInfoCommand::Line { address, .. } => *address,
        }
    }
}

impl fmt::Display for LineInfoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x} ", self.address())?;
        match self {
            LineInfoCommand::EnterMethod { method, .. } => write!(f, "enter {method}"),
            LineInfoCommand::ExitMethod { .. } => write!(f, "exit"),
            LineInfoCommand::File { file, line, .. } => write!(f, "file {file}:{line}"),
            LineInfoCommand::Line { line, .. } => write!(f, "line {line}"),
        }
    }
}

/// The call site an inlined method was expanded at.
///
/// Forms a list from the innermost call site outwards through `parent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InliningLocation {
    /// File of the call site, if it was known
    pub file: Option<Arc<FileInfo>>,
    /// Line of the call site
    pub line: u32,
    /// The method that was inlined at this call site
    pub method: Arc<MethodInfo>,
    /// Call site the enclosing code was itself inlined at
    pub parent: Option<Arc<InliningLocation>>,
}

/// A source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Source file
    pub file: Arc<FileInfo>,
    /// Line within `file`
    pub line: u32,
    /// Innermost call site this code was inlined at
    pub inlining: Option<Arc<InliningLocation>>,
}

impl Location {
    /// Returns the number of inlined calls this position is nested in.
    #[must_use]
    pub fn depth(&self) -> usize {
        std::iter::successors(self.inlining.as_deref(), |inlining| {
            inlining.parent.as_deref()
        })
        .count()
    }

    /// Returns the name of the source file.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file.name
    }

    /// Returns `true` if this is line `line` of the file named `file_name`.
    #[must_use]
    pub fn is_at(&self, file_name: &str, line: u32) -> bool {
        self.line == line && self.file.name == file_name
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)?;
        let mut inlining = self.inlining.as_deref();
        while let Some(site) = inlining {
            match &site.file {
                Some(file) => write!(f, " <- {} at {file}:{}", site.method, site.line)?,
                None => write!(f, " <- {} at ?:{}", site.method, site.line)?,
            }
            inlining = site.parent.as_deref();
        }
        Ok(())
    }
}

/// A code address with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionLocation {
    /// Code-section address
    pub address: u32,
    /// Source position of the code from `address` on
    pub location: Location,
}

impl fmt::Display for InstructionLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x} {}", self.address, self.location)
    }
}

/// The line table of one function, in command form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfoSequence {
    /// First address of the function
    pub start_address: u32,
    /// Address just past the function
    pub end_address: u32,
    /// The function's method
    pub method: Arc<MethodInfo>,
    /// Commands in address order
    pub commands: Vec<LineInfoCommand>,
}

#[derive(Clone)]
struct Frame {
    file: Option<Arc<FileInfo>>,
    line: u32,
    inlining: Option<Arc<InliningLocation>>,
}

impl LineInfoSequence {
    /// Creates a sequence.
    pub fn new(
        start_address: u32,
        end_address: u32,
        method: Arc<MethodInfo>,
        commands: Vec<LineInfoCommand>,
    ) -> Self {
        LineInfoSequence {
            start_address,
            end_address,
            method,
            commands,
        }
    }

    /// Returns `true` if `address` belongs to this function.
    #[must_use]
    pub fn contains(&self, address: u32) -> bool {
        (self.start_address..self.end_address).contains(&address)
    }

    /// Replays the commands into explicit locations.
    ///
    /// Entering an inlined method pushes the current position and leaves the
    /// file unknown until the next `File` command. Exiting restores the
    /// pushed position without producing a location. Every other command
    /// produces a location once a file is known. When several commands share
    /// an address, the last one wins.
    #[must_use]
    pub fn unpack(&self) -> LineInfoUnpackedSequence {
        let mut state = Frame {
            file: None,
            line: 1,
            inlining: None,
        };
        let mut stack: Vec<Frame> = Vec::new();
        let mut locations: Vec<InstructionLocation> = Vec::new();

        for command in &self.commands {
            match command {
                LineInfoCommand::EnterMethod { method, .. } => {
                    let inlining = Arc::new(InliningLocation {
                        file: state.file.clone(),
                        line: state.line,
                        method: method.clone(),
                        parent: state.inlining.clone(),
                    });
                    let caller = std::mem::replace(
                        &mut state,
                        Frame {
                            file: None,
                            line: 1,
                            inlining: Some(inlining),
                        },
                    );
                    stack.push(caller);
                    continue;
                }
                LineInfoCommand::ExitMethod { .. } => {
                    if let Some(caller) = stack.pop() {
                        state = caller;
                    }
                    continue;
                }
                LineInfoCommand::File { file, line, .. } => {
                    state.file = Some(file.clone());
                    state.line = *line;
                }
                LineInfoCommand::Line { line, .. } => state.line = *line,
            }

            let Some(file) = &state.file else {
                continue;
            };
            let entry = InstructionLocation {
                address: command.address(),
                location: Location {
                    file: file.clone(),
                    line: state.line,
                    inlining: state.inlining.clone(),
                },
            };
            match locations.last_mut() {
                Some(last) if last.address == entry.address => *last = entry,
                _ => locations.push(entry),
            }
        }

        LineInfoUnpackedSequence {
            start_address: self.start_address,
            end_address: self.end_address,
            method: self.method.clone(),
            locations,
        }
    }
}

impl fmt::Display for LineInfoSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  [{:#06x}, {:#06x}) {}",
            self.start_address, self.end_address, self.method
        )?;
        for command in &self.commands {
            writeln!(f, "    {command}")?;
        }
        Ok(())
    }
}

/// The line table of one function, as explicit locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfoUnpackedSequence {
    /// First address of the function
    pub start_address: u32,
    /// Address just past the function
    pub end_address: u32,
    /// The function's method
    pub method: Arc<MethodInfo>,
    /// Locations in strictly increasing address order
    pub locations: Vec<InstructionLocation>,
}

impl LineInfoUnpackedSequence {
    /// Returns the location in effect at `address`.
    ///
    /// That is the last location at or before `address`. Addresses outside
    /// the function, or before its first location, have none.
    #[must_use]
    pub fn find(&self, address: u32) -> Option<&InstructionLocation> {
        self.find_index(address).map(|index| &self.locations[index])
    }

    /// Returns the index of the location [`find`](Self::find) returns.
    #[must_use]
    pub fn find_index(&self, address: u32) -> Option<usize> {
        if !(self.start_address..self.end_address).contains(&address) {
            return None;
        }
        find_at_or_before(&self.locations, address, |loc| loc.address)
    }
}

/// Line tables of all functions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineInfo {
    sequences: Vec<LineInfoSequence>,
}

impl LineInfo {
    /// Creates the table, sorting `sequences` by start address.
    ///
    /// Sequences must not overlap.
    pub fn new(mut sequences: Vec<LineInfoSequence>) -> Self {
        sequences.sort_by_key(|sequence| sequence.start_address);
        LineInfo { sequences }
    }

    /// Returns all sequences in address order.
    #[must_use]
    pub fn sequences(&self) -> &[LineInfoSequence] {
        &self.sequences
    }

    /// Returns `true` if there are no sequences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Returns the sequence covering the code-section `address`.
    #[must_use]
    pub fn find(&self, address: u32) -> Option<&LineInfoSequence> {
        find_range(&self.sequences, address, |s| (s.start_address, s.end_address))
            .map(|index| &self.sequences[index])
    }
}

impl fmt::Display for LineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sequence in &self.sequences {
            write!(f, "{sequence}")?;
        }
        Ok(())
    }
}
