//! The mutable method body.

use std::ops::{Index, IndexMut};

use crate::ir::{BasicBlock, BlockId, VarId, Variable};

/// A method body: basic blocks plus a flat variable namespace.
///
/// Blocks and variables live in growable vectors and are only ever appended;
/// a block that becomes unreachable stays in place, unreferenced. Block 0 is
/// the entry. Cloning a program is the copy-on-write step used before a pass
/// splices one program into another.
///
/// Indexing with a [`BlockId`] that does not belong to the program panics.
/// Such an index can only come from a corrupted program, and the transformation
/// passes rely on that fault surfacing immediately.
///
/// # Examples
///
/// ```rust
/// use optiscope::ir::{Instruction, Program};
///
/// let mut program = Program::new();
/// let entry = program.create_block();
/// let value = program.create_variable();
/// program[entry].instructions.push(Instruction::Const { dest: value, value: 42 });
/// program[entry].instructions.push(Instruction::Return { value: Some(value) });
/// assert_eq!(program.block_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    blocks: Vec<BasicBlock>,
    variables: Vec<Variable>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty program with `count` pre-allocated variables, i.e.
    /// the receiver slot plus `count - 1` parameters.
    #[must_use]
    pub fn with_variables(count: usize) -> Self {
        let mut program = Self::new();
        for _ in 0..count {
            program.create_variable();
        }
        program
    }

    /// Appends an empty block and returns its index.
    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(BasicBlock::new(id));
        id
    }

    /// Appends a fresh variable and returns its index.
    pub fn create_variable(&mut self) -> VarId {
        let id = VarId::new(self.variables.len());
        self.variables.push(Variable::new(id));
        id
    }

    /// Appends a fresh variable carrying `debug_name`.
    pub fn create_named_variable(&mut self, debug_name: Option<String>) -> VarId {
        let id = self.create_variable();
        self.variables[id.index()].debug_name = debug_name;
        id
    }

    /// Returns the entry block index.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Returns the block at `id`, if it exists.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    /// Returns the block at `id` mutably, if it exists.
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.index())
    }

    /// Returns all blocks in index order.
    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Returns all blocks mutably in index order.
    pub fn blocks_mut(&mut self) -> &mut [BasicBlock] {
        &mut self.blocks
    }

    /// Returns the variable at `id`, if it exists.
    #[must_use]
    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    /// Returns all variables in index order.
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Returns the total number of instructions over all blocks.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|block| block.instructions.len()).sum()
    }

    /// Returns, for every variable, the block that defines it.
    ///
    /// Variables without a definition (parameters, unused slots) map to
    /// `None`. If a malformed program defines a variable twice, the first
    /// definition in block order wins.
    #[must_use]
    pub fn definition_places(&self) -> Vec<Option<BlockId>> {
        let mut places = vec![None; self.variables.len()];
        for block in &self.blocks {
            for var in block.defined_variables() {
                if let Some(place) = places.get_mut(var.index()) {
                    if place.is_none() {
                        *place = Some(block.id);
                    }
                }
            }
        }
        places
    }
}

impl Index<BlockId> for Program {
    type Output = BasicBlock;

    fn index(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }
}

impl IndexMut<BlockId> for Program {
    fn index_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }
}
