//! Control-flow graph of a [`Program`].
//!
//! Edges are derived from each block's terminator targets and from its
//! try/catch handlers. Exception edges are ordinary edges here: a handler is
//! a successor of every block it protects, so dominance and loop detection
//! see the same shape that the interpreter executes.

use crate::{
    ir::{BlockId, Program},
    utils::graph::{
        algorithms::{compute_dominators, DominatorTree},
        DirectedGraph, GraphBase, NodeId, Predecessors, RootedGraph, Successors,
    },
    Result,
};

/// A program's control-flow graph together with its dominator tree.
///
/// The graph is a snapshot: after a pass edits block terminators it must build
/// a new one.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    graph: DirectedGraph,
    dominators: DominatorTree,
}

impl ControlFlowGraph {
    /// Builds the graph for `program`, rooted at block 0.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if a terminator or handler refers to a
    /// block that does not exist.
    pub fn build(program: &Program) -> Result<Self> {
        let graph = build_graph(program)?;
        let dominators = compute_dominators(&graph, NodeId::from(program.entry()));
        Ok(ControlFlowGraph { graph, dominators })
    }

    /// Returns the underlying graph.
    #[must_use]
    pub fn graph(&self) -> &DirectedGraph {
        &self.graph
    }

    /// Returns the dominator tree rooted at the entry block.
    #[must_use]
    pub fn dominators(&self) -> &DominatorTree {
        &self.dominators
    }

    /// Returns the distinct successors of `block`.
    pub fn block_successors(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.graph
            .successor_slice(block.into())
            .iter()
            .map(|&node| BlockId::from(node))
    }

    /// Returns the distinct predecessors of `block`.
    pub fn block_predecessors(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.graph
            .predecessor_slice(block.into())
            .iter()
            .map(|&node| BlockId::from(node))
    }

    /// Returns `true` if `a` dominates `b`.
    #[must_use]
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        self.dominators.dominates(a.into(), b.into())
    }

    /// Returns `true` if `block` is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.dominators.is_reachable(block.into())
    }
}

/// Builds the bare control-flow graph of `program`.
///
/// # Errors
///
/// Returns [`crate::Error::GraphError`] for edges to non-existent blocks.
pub fn build_graph(program: &Program) -> Result<DirectedGraph> {
    let mut graph = DirectedGraph::with_nodes(program.block_count());
    for block in program.blocks() {
        for succ in block.successors() {
            graph.add_edge(block.id.into(), succ.into())?;
        }
    }
    Ok(graph)
}

impl GraphBase for ControlFlowGraph {
    fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        self.graph.node_ids()
    }
}

impl Successors for ControlFlowGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.graph.successors(node)
    }
}

impl Predecessors for ControlFlowGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.graph.predecessors(node)
    }
}

impl RootedGraph for ControlFlowGraph {
    fn entry(&self) -> NodeId {
        NodeId::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{BranchCondition, Instruction, ProgramBuilder},
        Error,
    };

    #[test]
    fn test_cfg_with_exception_edge() {
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let then = b.block();
        let handler = b.block();
        b.try_catch(entry, None, handler);
        b.branch(entry, BranchCondition::Equal, b.parameter(1), then, then);
        b.ret(then, None);
        b.ret(handler, None);

        let cfg = ControlFlowGraph::build(&b.build()).unwrap();
        let succ: Vec<_> = cfg.block_successors(entry).collect();
        assert_eq!(succ, vec![then, handler]);
        assert_eq!(cfg.block_predecessors(then).count(), 1);
        assert!(cfg.dominates(entry, handler));
    }

    #[test]
    fn test_cfg_rejects_dangling_target() {
        let mut b = ProgramBuilder::new(0);
        let entry = b.block();
        b.push(
            entry,
            Instruction::Jump {
                target: BlockId::new(5),
            },
        );
        assert!(matches!(
            ControlFlowGraph::build(&b.build()),
            Err(Error::GraphError(_))
        ));
    }

    #[test]
    fn test_unreachable_block() {
        let mut b = ProgramBuilder::new(0);
        let entry = b.block();
        let dead = b.block();
        b.ret(entry, None);
        b.jump(dead, entry);

        let cfg = ControlFlowGraph::build(&b.build()).unwrap();
        assert!(cfg.is_reachable(entry));
        assert!(!cfg.is_reachable(dead));
    }
}
