//! Fluent construction of programs.
//!
//! Front ends and tests build programs block by block. The builder only
//! allocates and appends; it performs no validation, which is the job of
//! [`crate::ir::verify`].

use crate::ir::{
    BinaryBranchCondition, BinaryOp, BlockId, BranchCondition, ElementType, Instruction,
    InvocationKind, MethodRef, Phi, Program, SwitchCase, TryCatch, VarId,
};

/// Builder for [`Program`].
///
/// # Examples
///
/// ```rust
/// use optiscope::ir::{BinaryOp, ProgramBuilder};
///
/// // static int inc(int x) { return x + 1; }
/// let mut b = ProgramBuilder::new(1);
/// let entry = b.block();
/// let one = b.constant(entry, 1);
/// let sum = b.binary(entry, BinaryOp::Add, b.parameter(1), one);
/// b.ret(entry, Some(sum));
/// let program = b.build();
/// assert_eq!(program.variable_count(), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    /// Creates a builder for a method with `parameters` arguments. Variable 0
    /// is the receiver slot, variables `1..=parameters` the arguments.
    #[must_use]
    pub fn new(parameters: usize) -> Self {
        ProgramBuilder {
            program: Program::with_variables(parameters + 1),
        }
    }

    /// Returns the variable holding parameter `index` (0 is the receiver).
    #[must_use]
    pub fn parameter(&self, index: usize) -> VarId {
        VarId::new(index)
    }

    /// Appends an empty block.
    pub fn block(&mut self) -> BlockId {
        self.program.create_block()
    }

    /// Allocates a fresh variable.
    pub fn var(&mut self) -> VarId {
        self.program.create_variable()
    }

    /// Appends an arbitrary instruction to `block`.
    pub fn push(&mut self, block: BlockId, insn: Instruction) -> &mut Self {
        self.program[block].instructions.push(insn);
        self
    }

    /// Appends `dest = value` and returns `dest`.
    pub fn constant(&mut self, block: BlockId, value: i64) -> VarId {
        let dest = self.var();
        self.push(block, Instruction::Const { dest, value });
        dest
    }

    /// Appends `dest = null` and returns `dest`.
    pub fn null(&mut self, block: BlockId) -> VarId {
        let dest = self.var();
        self.push(block, Instruction::Null { dest });
        dest
    }

    /// Appends `dest = src` and returns `dest`.
    pub fn copy(&mut self, block: BlockId, src: VarId) -> VarId {
        let dest = self.var();
        self.push(block, Instruction::Copy { dest, src });
        dest
    }

    /// Appends `dest = left <op> right` and returns `dest`.
    pub fn binary(&mut self, block: BlockId, op: BinaryOp, left: VarId, right: VarId) -> VarId {
        let dest = self.var();
        self.push(
            block,
            Instruction::Binary {
                dest,
                op,
                left,
                right,
            },
        );
        dest
    }

    /// Appends `dest = new element[size]` and returns `dest`.
    pub fn new_array(&mut self, block: BlockId, element: ElementType, size: VarId) -> VarId {
        let dest = self.var();
        self.push(
            block,
            Instruction::NewArray {
                dest,
                element,
                size,
            },
        );
        dest
    }

    /// Appends `dest = unwrap(array)` and returns `dest`.
    pub fn unwrap_array(&mut self, block: BlockId, array: VarId, element: ElementType) -> VarId {
        let dest = self.var();
        self.push(
            block,
            Instruction::UnwrapArray {
                dest,
                array,
                element,
            },
        );
        dest
    }

    /// Appends a call. A result variable is allocated when `returns_value`.
    pub fn invoke(
        &mut self,
        block: BlockId,
        method: MethodRef,
        kind: InvocationKind,
        instance: Option<VarId>,
        arguments: Vec<VarId>,
        returns_value: bool,
    ) -> Option<VarId> {
        let dest = returns_value.then(|| self.var());
        self.push(
            block,
            Instruction::Invoke {
                dest,
                instance,
                method,
                arguments,
                kind,
            },
        );
        dest
    }

    /// Adds an empty phi to `block` and returns its receiver. Incomings are
    /// added with [`ProgramBuilder::incoming`] once their values exist.
    pub fn phi(&mut self, block: BlockId) -> VarId {
        let dest = self.var();
        self.program[block].phis.push(Phi::new(dest));
        dest
    }

    /// Adds `(source, value)` to the phi of `block` receiving `phi`.
    pub fn incoming(&mut self, block: BlockId, phi: VarId, source: BlockId, value: VarId) {
        if let Some(target) = self.program[block]
            .phis
            .iter_mut()
            .find(|candidate| candidate.dest == phi)
        {
            target.add_incoming(source, value);
        }
    }

    /// Protects `block` with a handler and returns the exception variable.
    pub fn try_catch(
        &mut self,
        block: BlockId,
        exception_type: Option<&str>,
        handler: BlockId,
    ) -> VarId {
        let exception = self.var();
        self.program[block].try_catches.push(TryCatch::new(
            exception_type.map(str::to_string),
            handler,
            exception,
        ));
        exception
    }

    /// Terminates `block` with a jump.
    pub fn jump(&mut self, block: BlockId, target: BlockId) {
        self.push(block, Instruction::Jump { target });
    }

    /// Terminates `block` with a single-operand branch.
    pub fn branch(
        &mut self,
        block: BlockId,
        condition: BranchCondition,
        operand: VarId,
        true_target: BlockId,
        false_target: BlockId,
    ) {
        self.push(
            block,
            Instruction::Branch {
                condition,
                operand,
                true_target,
                false_target,
            },
        );
    }

    /// Terminates `block` with a two-operand branch.
    pub fn compare_branch(
        &mut self,
        block: BlockId,
        condition: BinaryBranchCondition,
        left: VarId,
        right: VarId,
        true_target: BlockId,
        false_target: BlockId,
    ) {
        self.push(
            block,
            Instruction::BinaryBranch {
                condition,
                left,
                right,
                true_target,
                false_target,
            },
        );
    }

    /// Terminates `block` with a switch.
    pub fn switch(
        &mut self,
        block: BlockId,
        value: VarId,
        cases: &[(i64, BlockId)],
        default: BlockId,
    ) {
        let cases = cases
            .iter()
            .map(|&(value, target)| SwitchCase { value, target })
            .collect();
        self.push(
            block,
            Instruction::Switch {
                value,
                cases,
                default,
            },
        );
    }

    /// Terminates `block` with a return.
    pub fn ret(&mut self, block: BlockId, value: Option<VarId>) {
        self.push(block, Instruction::Return { value });
    }

    /// Terminates `block` with a throw.
    pub fn throw(&mut self, block: BlockId, exception: VarId) {
        self.push(block, Instruction::Throw { exception });
    }

    /// Returns the program under construction.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Finishes construction.
    #[must_use]
    pub fn build(self) -> Program {
        self.program
    }
}
