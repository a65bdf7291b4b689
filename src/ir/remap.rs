//! Total remapping of block and variable references.
//!
//! Copying a region of a program (inlining a callee, duplicating a loop
//! condition) allocates a parallel range of blocks and variables and then
//! rewrites every reference inside the copied blocks through a mapping.
//! [`Remapper::apply_to_block`] is the only entry point the passes use; it
//! always visits instructions, then phis, then try/catch entries, so a
//! mapping cannot be partially applied to a block.
//!
//! A mapping must be total over the references of the region it rewrites.
//! The default methods map everything to itself, which is the explicit
//! "unchanged" choice for references that leave the region.

use std::collections::HashMap;

use crate::ir::{BasicBlock, BlockId, Instruction, Phi, TryCatch, VarId};

/// A block and variable mapping applied to program fragments.
pub trait Remapper {
    /// Maps a block reference. Defaults to identity.
    fn map_block(&self, block: BlockId) -> BlockId {
        block
    }

    /// Maps a variable reference. Defaults to identity.
    fn map_variable(&self, var: VarId) -> VarId {
        var
    }

    /// Rewrites the result, operands and successors of an instruction.
    fn map_instruction(&self, insn: &mut Instruction) {
        insn.map_dest(|var| self.map_variable(var));
        insn.map_uses(|var| self.map_variable(var));
        insn.map_targets(|block| self.map_block(block));
    }

    /// Rewrites the receiver and every incoming pair of a phi.
    fn map_phi(&self, phi: &mut Phi) {
        phi.dest = self.map_variable(phi.dest);
        for incoming in &mut phi.incomings {
            incoming.source = self.map_block(incoming.source);
            incoming.value = self.map_variable(incoming.value);
        }
    }

    /// Rewrites the handler and exception variable of a try/catch entry.
    fn map_try_catch(&self, try_catch: &mut TryCatch) {
        try_catch.handler = self.map_block(try_catch.handler);
        try_catch.exception_variable = self.map_variable(try_catch.exception_variable);
    }

    /// Rewrites a whole block: instructions, then phis, then try/catch.
    fn apply_to_block(&self, block: &mut BasicBlock) {
        for insn in &mut block.instructions {
            self.map_instruction(insn);
        }
        for phi in &mut block.phis {
            self.map_phi(phi);
        }
        for try_catch in &mut block.try_catches {
            self.map_try_catch(try_catch);
        }
    }
}

/// Maps blocks through a closure; variables are unchanged.
pub struct BlockMapper<F>(pub F);

impl<F: Fn(BlockId) -> BlockId> Remapper for BlockMapper<F> {
    fn map_block(&self, block: BlockId) -> BlockId {
        (self.0)(block)
    }
}

/// Maps variables through a closure; blocks are unchanged.
pub struct VariableMapper<F>(pub F);

impl<F: Fn(VarId) -> VarId> Remapper for VariableMapper<F> {
    fn map_variable(&self, var: VarId) -> VarId {
        (self.0)(var)
    }
}

/// Maps blocks and variables through two closures.
pub struct ProgramMapper<B, V> {
    blocks: B,
    variables: V,
}

impl<B, V> ProgramMapper<B, V>
where
    B: Fn(BlockId) -> BlockId,
    V: Fn(VarId) -> VarId,
{
    /// Combines a block and a variable mapping.
    pub fn new(blocks: B, variables: V) -> Self {
        ProgramMapper { blocks, variables }
    }
}

impl<B, V> Remapper for ProgramMapper<B, V>
where
    B: Fn(BlockId) -> BlockId,
    V: Fn(VarId) -> VarId,
{
    fn map_block(&self, block: BlockId) -> BlockId {
        (self.blocks)(block)
    }

    fn map_variable(&self, var: VarId) -> VarId {
        (self.variables)(var)
    }
}

/// Explicit copy tables; anything absent maps to itself.
#[derive(Debug, Clone, Default)]
pub struct CopyTable {
    /// Original block to its copy
    pub blocks: HashMap<BlockId, BlockId>,
    /// Original variable to its copy
    pub variables: HashMap<VarId, VarId>,
}

impl Remapper for CopyTable {
    fn map_block(&self, block: BlockId) -> BlockId {
        self.blocks.get(&block).copied().unwrap_or(block)
    }

    fn map_variable(&self, var: VarId) -> VarId {
        self.variables.get(&var).copied().unwrap_or(var)
    }
}
