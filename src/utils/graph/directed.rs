//! Adjacency-list directed graph.
//!
//! [`DirectedGraph`] stores successor and predecessor lists side by side so
//! both directions can be walked in O(degree). Nodes carry no payload: the
//! graph describes the shape of a program, and the program itself remains the
//! owner of block contents.
//!
//! Parallel edges are collapsed on insertion. A two-way branch whose arms
//! target the same block therefore contributes a single edge, which matches
//! how phi incomings are keyed (one incoming per distinct predecessor).

use crate::{
    utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors},
    Error, Result,
};

/// A directed graph over dense node indices.
///
/// # Examples
///
/// ```rust
/// use optiscope::utils::graph::{DirectedGraph, NodeId};
///
/// let mut graph = DirectedGraph::with_nodes(3);
/// graph.add_edge(NodeId::new(0), NodeId::new(1))?;
/// graph.add_edge(NodeId::new(1), NodeId::new(2))?;
/// assert_eq!(graph.edge_count(), 2);
/// # Ok::<(), optiscope::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DirectedGraph {
    successors: Vec<Vec<NodeId>>,
    predecessors: Vec<Vec<NodeId>>,
    entry: NodeId,
}

impl DirectedGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a graph with `count` isolated nodes and node 0 as entry.
    #[must_use]
    pub fn with_nodes(count: usize) -> Self {
        DirectedGraph {
            successors: vec![Vec::new(); count],
            predecessors: vec![Vec::new(); count],
            entry: NodeId::new(0),
        }
    }

    /// Appends a new isolated node and returns its identifier.
    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId::new(self.successors.len());
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
        id
    }

    /// Adds an edge from `source` to `target`.
    ///
    /// Returns `Ok(false)` when the edge already existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if either endpoint is not a node of this graph.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<bool> {
        let count = self.node_count();
        if source.index() >= count || target.index() >= count {
            return Err(Error::GraphError(format!(
                "edge {source} -> {target} references a node outside 0..{count}"
            )));
        }

        if self.successors[source.index()].contains(&target) {
            return Ok(false);
        }

        self.successors[source.index()].push(target);
        self.predecessors[target.index()].push(source);
        Ok(true)
    }

    /// Sets the entry node used by [`RootedGraph::entry`].
    pub fn set_entry(&mut self, entry: NodeId) {
        self.entry = entry;
    }

    /// Returns the total number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }

    /// Returns `true` if the edge `source -> target` exists.
    #[must_use]
    pub fn contains_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.successors
            .get(source.index())
            .is_some_and(|succ| succ.contains(&target))
    }

    /// Returns the number of outgoing edges of `node`.
    #[must_use]
    pub fn out_degree(&self, node: NodeId) -> usize {
        self.successors.get(node.index()).map_or(0, Vec::len)
    }

    /// Returns the number of incoming edges of `node`.
    #[must_use]
    pub fn in_degree(&self, node: NodeId) -> usize {
        self.predecessors.get(node.index()).map_or(0, Vec::len)
    }

    /// Returns every node without outgoing edges.
    pub fn exit_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.successors
            .iter()
            .enumerate()
            .filter(|(_, succ)| succ.is_empty())
            .map(|(index, _)| NodeId::new(index))
    }

    /// Returns a slice view of the successors of `node`.
    #[must_use]
    pub fn successor_slice(&self, node: NodeId) -> &[NodeId] {
        self.successors.get(node.index()).map_or(&[], Vec::as_slice)
    }

    /// Returns a slice view of the predecessors of `node`.
    #[must_use]
    pub fn predecessor_slice(&self, node: NodeId) -> &[NodeId] {
        self.predecessors.get(node.index()).map_or(&[], Vec::as_slice)
    }
}

impl GraphBase for DirectedGraph {
    fn node_count(&self) -> usize {
        self.successors.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.successors.len()).map(NodeId::new)
    }
}

impl Successors for DirectedGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.successor_slice(node).iter().copied()
    }
}

impl Predecessors for DirectedGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.predecessor_slice(node).iter().copied()
    }
}

impl RootedGraph for DirectedGraph {
    fn entry(&self) -> NodeId {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_edge_deduplicates() {
        let mut graph = DirectedGraph::with_nodes(2);
        assert!(graph.add_edge(NodeId::new(0), NodeId::new(1)).unwrap());
        assert!(!graph.add_edge(NodeId::new(0), NodeId::new(1)).unwrap());
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.in_degree(NodeId::new(1)), 1);
    }

    #[test]
    fn test_add_edge_rejects_unknown_node() {
        let mut graph = DirectedGraph::with_nodes(2);
        let result = graph.add_edge(NodeId::new(0), NodeId::new(5));
        assert!(matches!(result, Err(Error::GraphError(_))));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_exit_nodes_and_degrees() {
        let mut graph = DirectedGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();
        graph.add_edge(a, b).unwrap();
        graph.add_edge(a, c).unwrap();
        graph.add_edge(b, a).unwrap();

        let exits: Vec<_> = graph.exit_nodes().collect();
        assert_eq!(exits, vec![c]);
        assert_eq!(graph.out_degree(a), 2);
        assert!(graph.contains_edge(b, a));
        assert!(!graph.contains_edge(c, a));
        assert_eq!(graph.predecessors(a).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn test_out_of_range_queries_are_empty() {
        let graph = DirectedGraph::with_nodes(1);
        assert_eq!(graph.out_degree(NodeId::new(9)), 0);
        assert!(graph.successor_slice(NodeId::new(9)).is_empty());
    }
}
