//! Basic blocks and their exception regions.

use crate::ir::{BlockId, Instruction, Phi, VarId};

/// An exception edge from a protected block to a handler.
///
/// The exception variable is defined on the edge itself: it is live at the
/// entry of the handler (or feeds a phi there) and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatch {
    /// Caught class, or `None` to catch everything
    pub exception_type: Option<String>,
    /// Block receiving control
    pub handler: BlockId,
    /// Variable receiving the caught exception
    pub exception_variable: VarId,
}

impl TryCatch {
    /// Creates a try/catch entry.
    pub fn new(
        exception_type: Option<String>,
        handler: BlockId,
        exception_variable: VarId,
    ) -> Self {
        TryCatch {
            exception_type,
            handler,
            exception_variable,
        }
    }
}

/// A basic block: phis, then instructions ending in a terminator, plus the
/// try/catch regions protecting those instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Index of this block
    pub id: BlockId,
    /// Value merges at block entry
    pub phis: Vec<Phi>,
    /// Ordered instructions; the last one is the terminator
    pub instructions: Vec<Instruction>,
    /// Exception edges, in handler priority order
    pub try_catches: Vec<TryCatch>,
}

impl BasicBlock {
    /// Creates an empty block.
    #[must_use]
    pub fn new(id: BlockId) -> Self {
        BasicBlock {
            id,
            phis: Vec::new(),
            instructions: Vec::new(),
            try_catches: Vec::new(),
        }
    }

    /// Returns the terminator, if the block has one.
    #[must_use]
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|insn| insn.is_terminator())
    }

    /// Returns a mutable reference to the terminator, if the block has one.
    pub fn terminator_mut(&mut self) -> Option<&mut Instruction> {
        self.instructions
            .last_mut()
            .filter(|insn| insn.is_terminator())
    }

    /// Returns the distinct control-flow successors: terminator targets first,
    /// then exception handlers, each at most once.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        let mut result: Vec<BlockId> = Vec::new();
        let targets = self
            .terminator()
            .map(Instruction::targets)
            .unwrap_or_default();
        for block in targets
            .into_iter()
            .chain(self.try_catches.iter().map(|tc| tc.handler))
        {
            if !result.contains(&block) {
                result.push(block);
            }
        }
        result
    }

    /// Returns every variable defined in this block: phi receivers,
    /// instruction results and exception variables.
    #[must_use]
    pub fn defined_variables(&self) -> Vec<VarId> {
        self.phis
            .iter()
            .map(|phi| phi.dest)
            .chain(self.instructions.iter().filter_map(Instruction::dest))
            .chain(self.try_catches.iter().map(|tc| tc.exception_variable))
            .collect()
    }

    /// Returns `true` if the block contains no instructions and no phis.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty() && self.phis.is_empty()
    }
}
