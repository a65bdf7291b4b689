//! Index newtypes for blocks and variables.
//!
//! A [`crate::ir::Program`] owns its blocks and variables in contiguous
//! vectors; everything else refers to them through these indices. Copying a
//! region of a program therefore never rewrites pointers, only numbers.

use std::fmt;

use crate::utils::graph::NodeId;

/// Index of a basic block within one program.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Creates a block identifier from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        BlockId(index)
    }

    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Returns this block shifted by `offset` positions.
    #[must_use]
    #[inline]
    pub const fn offset(self, offset: usize) -> Self {
        BlockId(self.0 + offset)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$B{}", self.0)
    }
}

impl From<NodeId> for BlockId {
    #[inline]
    fn from(node: NodeId) -> Self {
        BlockId(node.index())
    }
}

impl From<BlockId> for NodeId {
    #[inline]
    fn from(block: BlockId) -> Self {
        NodeId::new(block.0)
    }
}

/// Index of a variable within one program.
///
/// Variable 0 holds the receiver instance of the method (unused by static
/// methods) and variables `1..=N` hold its arguments.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarId(pub(crate) usize);

impl VarId {
    /// Creates a variable identifier from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        VarId(index)
    }

    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarId({})", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}
