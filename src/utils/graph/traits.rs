//! Capability traits shared by the graph algorithms.
//!
//! Algorithms such as [`crate::utils::graph::algorithms::compute_dominators`]
//! are written against these traits rather than against a concrete graph, so
//! the same code serves forward control-flow graphs, inverted graphs used for
//! postdominance, and small ad-hoc graphs in tests.

use crate::utils::graph::NodeId;

/// Basic node enumeration for a graph whose nodes are dense indices.
pub trait GraphBase {
    /// Returns the number of nodes. Valid node indices are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Returns an iterator over every node identifier.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Graphs that can enumerate outgoing edges.
pub trait Successors: GraphBase {
    /// Returns the direct successors of `node`.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Graphs that can enumerate incoming edges.
pub trait Predecessors: GraphBase {
    /// Returns the direct predecessors of `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// A graph with a distinguished entry node.
pub trait RootedGraph: Successors + Predecessors {
    /// Returns the entry node.
    fn entry(&self) -> NodeId;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EdgeList {
        nodes: usize,
        edges: Vec<(usize, usize)>,
    }

    impl GraphBase for EdgeList {
        fn node_count(&self) -> usize {
            self.nodes
        }

        fn node_ids(&self) -> impl Iterator<Item = NodeId> {
            (0..self.nodes).map(NodeId::new)
        }
    }

    impl Successors for EdgeList {
        fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
            self.edges
                .iter()
                .filter(move |(s, _)| *s == node.index())
                .map(|(_, t)| NodeId::new(*t))
        }
    }

    impl Predecessors for EdgeList {
        fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
            self.edges
                .iter()
                .filter(move |(_, t)| *t == node.index())
                .map(|(s, _)| NodeId::new(*s))
        }
    }

    impl RootedGraph for EdgeList {
        fn entry(&self) -> NodeId {
            NodeId::new(0)
        }
    }

    #[test]
    fn test_trait_object_free_usage() {
        let graph = EdgeList {
            nodes: 3,
            edges: vec![(0, 1), (0, 2), (1, 2)],
        };

        assert_eq!(graph.node_ids().count(), 3);
        assert_eq!(graph.successors(NodeId::new(0)).count(), 2);
        let preds: Vec<_> = graph.predecessors(NodeId::new(2)).collect();
        assert_eq!(preds, vec![NodeId::new(0), NodeId::new(1)]);
        assert_eq!(graph.entry(), NodeId::new(0));
    }
}
