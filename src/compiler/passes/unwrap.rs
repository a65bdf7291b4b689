//! Array-unwrap motion pass.
//!
//! An unwrap turns an array reference into its typed element storage. Keeping
//! it right next to the instruction that produced the array keeps the raw
//! reference's live range minimal. The pass moves every unwrap backward within
//! its block until it directly follows that definition.
//!
//! # Example
//!
//! Before:
//! ```text
//! @3 := newarray int[@1]
//! @4 := @1 add @2
//! @5 := unwrap int @3
//! ```
//!
//! After:
//! ```text
//! @3 := newarray int[@1]
//! @5 := unwrap int @3
//! @4 := @1 add @2
//! nop
//! ```
//!
//! # Algorithm
//!
//! For each unwrap, front to back within a block:
//!
//! 1. Replace it in place with a `nop`
//! 2. Scan backward for the instruction defining its array operand
//! 3. Reinsert it after that instruction, or at the start of the block when
//!    the array comes from a phi, a parameter or another block
//!
//! Unwraps already moved to the same spot form a chain: a later one is placed
//! after the earlier ones. Motion never crosses block boundaries.

use crate::{
    compiler::{pass::ProgramPass, CompilerContext, EventKind},
    ir::{BlockId, Instruction, MethodRef, Program},
    Result,
};

/// Array-unwrap motion pass.
pub struct UnwrapMotionPass;

impl Default for UnwrapMotionPass {
    fn default() -> Self {
        Self::new()
    }
}

impl UnwrapMotionPass {
    /// Creates a new unwrap motion pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Moves every unwrap of `program` next to its array definition.
    ///
    /// Returns the block of every unwrap that moved, once per unwrap.
    pub fn apply(&self, program: &mut Program) -> Vec<BlockId> {
        let mut moved = Vec::new();
        for block in program.blocks_mut() {
            let count = Self::apply_to_block(&mut block.instructions);
            moved.extend(std::iter::repeat(block.id).take(count));
        }
        moved
    }

    fn apply_to_block(instructions: &mut Vec<Instruction>) -> usize {
        let mut moved = 0;
        let mut index = 0;
        while index < instructions.len() {
            let Instruction::UnwrapArray { array, .. } = instructions[index] else {
                index += 1;
                continue;
            };

            let mut insertion = instructions[..index]
                .iter()
                .rposition(|insn| insn.dest() == Some(array))
                .map_or(0, |position| position + 1);
            // Everything before `index` has been processed, so an unwrap found
            // there was moved earlier.
            while insertion < index
                && matches!(instructions[insertion], Instruction::UnwrapArray { .. })
            {
                insertion += 1;
            }

            if insertion < index {
                let unwrap = std::mem::replace(&mut instructions[index], Instruction::Nop);
                instructions.insert(insertion, unwrap);
                moved += 1;
                // The nop left behind now sits at `index + 1`.
                index += 2;
            } else {
                index += 1;
            }
        }
        moved
    }
}

impl ProgramPass for UnwrapMotionPass {
    fn name(&self) -> &'static str {
        "unwrap-motion"
    }

    fn description(&self) -> &'static str {
        "Moves array unwraps next to the definition of their array"
    }

    fn run_on_method(
        &self,
        program: &mut Program,
        method: &MethodRef,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        let moved = self.apply(program);
        for block in &moved {
            ctx.events
                .record(EventKind::UnwrapMoved)
                .at(method.clone(), block.index())
                .pass(self.name());
        }
        Ok(!moved.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, ElementType, ProgramBuilder};

    fn kinds(program: &Program, block: BlockId) -> Vec<String> {
        program[block]
            .instructions
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_moves_after_definition() {
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let array = b.new_array(entry, ElementType::Int, b.parameter(1));
        let sum = b.binary(entry, BinaryOp::Add, b.parameter(1), b.parameter(1));
        let view = b.unwrap_array(entry, array, ElementType::Int);
        b.ret(entry, Some(sum));
        let mut program = b.build();

        let moved = UnwrapMotionPass::new().apply(&mut program);

        assert_eq!(moved, vec![entry]);
        let insns = &program[entry].instructions;
        assert_eq!(insns.len(), 5);
        assert_eq!(insns[1].dest(), Some(view));
        assert_eq!(insns[2].dest(), Some(sum));
        assert!(insns[3].is_nop());
    }

    #[test]
    fn test_array_from_other_block_goes_to_start() {
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let next = b.block();
        let array = b.new_array(entry, ElementType::Object, b.parameter(1));
        b.jump(entry, next);
        let sum = b.binary(next, BinaryOp::Add, b.parameter(1), b.parameter(1));
        let view = b.unwrap_array(next, array, ElementType::Object);
        b.ret(next, Some(sum));
        let mut program = b.build();

        UnwrapMotionPass::new().apply(&mut program);

        assert_eq!(program[next].instructions[0].dest(), Some(view));
        assert_eq!(program[next].instructions[1].dest(), Some(sum));
    }

    #[test]
    fn test_unwraps_of_same_array_chain() {
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let array = b.new_array(entry, ElementType::Int, b.parameter(1));
        let sum = b.binary(entry, BinaryOp::Add, b.parameter(1), b.parameter(1));
        let first = b.unwrap_array(entry, array, ElementType::Int);
        let product = b.binary(entry, BinaryOp::Mul, sum, sum);
        let second = b.unwrap_array(entry, array, ElementType::Int);
        b.ret(entry, Some(product));
        let mut program = b.build();

        let moved = UnwrapMotionPass::new().apply(&mut program);

        assert_eq!(moved.len(), 2);
        let insns = &program[entry].instructions;
        assert_eq!(insns[0].dest(), Some(array));
        assert_eq!(insns[1].dest(), Some(first));
        assert_eq!(insns[2].dest(), Some(second));
        assert_eq!(insns[3].dest(), Some(sum));
    }

    #[test]
    fn test_already_local_unwrap_is_untouched() {
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let array = b.new_array(entry, ElementType::Int, b.parameter(1));
        b.unwrap_array(entry, array, ElementType::Int);
        b.ret(entry, None);
        let mut program = b.build();
        let before = kinds(&program, entry);

        assert!(UnwrapMotionPass::new().apply(&mut program).is_empty());
        assert_eq!(kinds(&program, entry), before);
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let array = b.new_array(entry, ElementType::Int, b.parameter(1));
        b.binary(entry, BinaryOp::Add, b.parameter(1), b.parameter(1));
        b.unwrap_array(entry, array, ElementType::Int);
        b.ret(entry, None);
        let mut program = b.build();

        let pass = UnwrapMotionPass::new();
        assert_eq!(pass.apply(&mut program).len(), 1);
        let once = program.clone();
        assert!(pass.apply(&mut program).is_empty());
        assert_eq!(program, once);
    }
}
