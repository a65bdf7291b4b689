//! Phi nodes.
//!
//! A phi merges one value per incoming edge at the entry of a block. The
//! incoming list is keyed by predecessor: a well-formed phi has exactly one
//! [`Incoming`] for every distinct predecessor of its block, and no others.
//! Passes that add or remove edges are responsible for keeping phis in
//! lockstep; [`crate::ir::verify`] checks it.

use crate::ir::{BlockId, VarId};

/// One `(source block, value)` pair of a [`Phi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Incoming {
    /// Predecessor block the value flows in from
    pub source: BlockId,
    /// Value at the end of `source`
    pub value: VarId,
}

impl Incoming {
    /// Creates an incoming pair.
    #[must_use]
    pub const fn new(source: BlockId, value: VarId) -> Self {
        Incoming { source, value }
    }
}

/// A value merge at block entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phi {
    /// Variable receiving the merged value
    pub dest: VarId,
    /// One entry per predecessor
    pub incomings: Vec<Incoming>,
}

impl Phi {
    /// Creates a phi without incomings.
    #[must_use]
    pub fn new(dest: VarId) -> Self {
        Phi {
            dest,
            incomings: Vec::new(),
        }
    }

    /// Appends an incoming pair.
    pub fn add_incoming(&mut self, source: BlockId, value: VarId) {
        self.incomings.push(Incoming::new(source, value));
    }

    /// Returns the value flowing in from `source`, if present.
    #[must_use]
    pub fn incoming_from(&self, source: BlockId) -> Option<VarId> {
        self.incomings
            .iter()
            .find(|incoming| incoming.source == source)
            .map(|incoming| incoming.value)
    }

    /// Drops every incoming whose source satisfies `predicate`.
    ///
    /// Returns the number of removed pairs.
    pub fn remove_incomings(&mut self, mut predicate: impl FnMut(&Incoming) -> bool) -> usize {
        let before = self.incomings.len();
        self.incomings.retain(|incoming| !predicate(incoming));
        before - self.incomings.len()
    }

    /// Replaces the source of every incoming from `old` with `new`.
    pub fn replace_source(&mut self, old: BlockId, new: BlockId) {
        for incoming in &mut self.incomings {
            if incoming.source == old {
                incoming.source = new;
            }
        }
    }
}
