//! Dominator and postdominator trees.
//!
//! A node `d` **dominates** a node `n` if every path from the entry to `n`
//! passes through `d`. The **immediate dominator** of `n` is the closest
//! strict dominator; linking every node to it forms the dominator tree.
//! Postdominance is the same relation computed on the inverted graph, rooted
//! at a virtual node that joins every exit.
//!
//! # Algorithm
//!
//! The tree is computed with the iterative scheme of Cooper, Harvey and
//! Kennedy: nodes are numbered in reverse postorder and each immediate
//! dominator is refined by intersecting the candidates of all processed
//! predecessors until nothing changes. For control-flow graphs of the size a
//! single method produces this converges in two or three sweeps.
//!
//! Nodes that cannot be reached from the root get no immediate dominator and
//! take part in no dominance relation. Transformations leave dead blocks in
//! place, so every query here tolerates them.

use crate::utils::graph::{
    algorithms::traversal::reverse_postorder, DirectedGraph, NodeId, Predecessors, RootedGraph,
    Successors,
};

/// Result of a dominator tree computation.
///
/// # Examples
///
/// ```rust
/// use optiscope::utils::graph::{algorithms::compute_dominators, DirectedGraph, NodeId};
///
/// let mut graph = DirectedGraph::with_nodes(3);
/// graph.add_edge(NodeId::new(0), NodeId::new(1))?;
/// graph.add_edge(NodeId::new(1), NodeId::new(2))?;
///
/// let tree = compute_dominators(&graph, NodeId::new(0));
/// assert!(tree.dominates(NodeId::new(0), NodeId::new(2)));
/// assert_eq!(tree.immediate_dominator(NodeId::new(2)), Some(NodeId::new(1)));
/// # Ok::<(), optiscope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// The root of the tree
    entry: NodeId,
    /// Immediate dominator per node; `None` for the root and unreachable nodes
    idom: Vec<Option<NodeId>>,
    /// Depth in the tree; `usize::MAX` marks an unreachable node
    depth: Vec<usize>,
}

impl DominatorTree {
    /// Returns the root node of the tree.
    #[inline]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the number of nodes covered by the tree.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.idom.len()
    }

    /// Returns `true` if `node` is reachable from the root.
    #[inline]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.depth
            .get(node.index())
            .is_some_and(|&depth| depth != usize::MAX)
    }

    /// Returns the immediate dominator of a node, or `None` for the root and
    /// for unreachable nodes.
    #[inline]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        self.idom.get(node.index()).copied().flatten()
    }

    /// Returns the depth of `node` in the tree (the root has depth 0), or
    /// `None` for unreachable nodes.
    pub fn depth(&self, node: NodeId) -> Option<usize> {
        match self.depth.get(node.index()) {
            Some(&depth) if depth != usize::MAX => Some(depth),
            _ => None,
        }
    }

    /// Checks if node `a` dominates node `b`.
    ///
    /// Every reachable node dominates itself. Unreachable nodes neither
    /// dominate nor are dominated.
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        let (Some(depth_a), Some(mut depth_b)) = (self.depth(a), self.depth(b)) else {
            return false;
        };

        let mut current = b;
        while depth_b > depth_a {
            match self.immediate_dominator(current) {
                Some(parent) => current = parent,
                None => return false,
            }
            depth_b -= 1;
        }
        current == a
    }

    /// Checks if node `a` strictly dominates node `b`.
    #[inline]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns an iterator over the dominators of `node`, from the node itself
    /// up to the root.
    pub fn dominators(&self, node: NodeId) -> DominatorIterator<'_> {
        DominatorIterator {
            tree: self,
            current: self.is_reachable(node).then_some(node),
        }
    }

    /// Returns the children of `node` in the tree, in index order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.idom
            .iter()
            .enumerate()
            .filter(|(_, idom)| **idom == Some(node))
            .map(|(index, _)| NodeId::new(index))
            .collect()
    }

    /// Returns the lowest common ancestor of `a` and `b`.
    pub fn common_dominator(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let (mut a, mut b) = (a, b);
        let mut depth_a = self.depth(a)?;
        let mut depth_b = self.depth(b)?;

        while depth_a > depth_b {
            a = self.immediate_dominator(a)?;
            depth_a -= 1;
        }
        while depth_b > depth_a {
            b = self.immediate_dominator(b)?;
            depth_b -= 1;
        }
        while a != b {
            a = self.immediate_dominator(a)?;
            b = self.immediate_dominator(b)?;
        }
        Some(a)
    }

    /// Returns the lowest node dominating every node of `nodes`.
    ///
    /// Unreachable nodes are ignored. Returns `None` when no reachable node
    /// was supplied; callers treat that as "nothing to anchor on".
    pub fn common_dominator_of<I>(&self, nodes: I) -> Option<NodeId>
    where
        I: IntoIterator<Item = NodeId>,
    {
        nodes
            .into_iter()
            .filter(|node| self.is_reachable(*node))
            .try_fold(None, |acc: Option<NodeId>, node| match acc {
                None => Some(Some(node)),
                Some(current) => self.common_dominator(current, node).map(Some),
            })
            .flatten()
    }
}

/// Iterator over the dominators of a node, from the node up to the root.
pub struct DominatorIterator<'a> {
    tree: &'a DominatorTree,
    current: Option<NodeId>,
}

impl Iterator for DominatorIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = self.tree.immediate_dominator(node);
        Some(node)
    }
}

/// Computes the dominator tree of `graph` rooted at `entry`.
///
/// # Arguments
///
/// * `graph` - The graph to analyze
/// * `entry` - The root; usually block 0 of a program
///
/// # Returns
///
/// A [`DominatorTree`] covering every node of the graph. An out-of-range
/// `entry` produces a tree in which every node is unreachable.
pub fn compute_dominators<G>(graph: &G, entry: NodeId) -> DominatorTree
where
    G: Successors + Predecessors,
{
    let node_count = graph.node_count();
    let mut idom: Vec<Option<NodeId>> = vec![None; node_count];
    let mut depth = vec![usize::MAX; node_count];

    if entry.index() >= node_count {
        return DominatorTree { entry, idom, depth };
    }

    let rpo = reverse_postorder(graph, entry);
    let mut order = vec![usize::MAX; node_count];
    for (position, node) in rpo.iter().enumerate() {
        order[node.index()] = position;
    }

    // The root is temporarily its own dominator so intersections terminate.
    idom[entry.index()] = Some(entry);

    let intersect = |idom: &[Option<NodeId>], mut a: NodeId, mut b: NodeId| -> NodeId {
        while a != b {
            while order[a.index()] > order[b.index()] {
                a = idom[a.index()].unwrap_or(entry);
            }
            while order[b.index()] > order[a.index()] {
                b = idom[b.index()].unwrap_or(entry);
            }
        }
        a
    };

    let mut changed = true;
    while changed {
        changed = false;
        for &node in rpo.iter().skip(1) {
            let mut candidate: Option<NodeId> = None;
            for pred in graph.predecessors(node) {
                if order[pred.index()] == usize::MAX || idom[pred.index()].is_none() {
                    continue;
                }
                candidate = Some(match candidate {
                    None => pred,
                    Some(current) => intersect(&idom, pred, current),
                });
            }

            if candidate.is_some() && idom[node.index()] != candidate {
                idom[node.index()] = candidate;
                changed = true;
            }
        }
    }

    idom[entry.index()] = None;
    depth[entry.index()] = 0;
    for &node in rpo.iter().skip(1) {
        if let Some(parent) = idom[node.index()] {
            // Reverse postorder visits every immediate dominator first.
            depth[node.index()] = depth[parent.index()].saturating_add(1);
        }
    }

    DominatorTree { entry, idom, depth }
}

/// Computes the dominator tree of a rooted graph from its own entry.
pub fn compute_dominators_rooted<G: RootedGraph>(graph: &G) -> DominatorTree {
    compute_dominators(graph, graph.entry())
}

/// Returns a copy of `graph` with every edge reversed.
pub fn invert<G: Successors>(graph: &G) -> DirectedGraph {
    let mut inverted = DirectedGraph::with_nodes(graph.node_count());
    for node in graph.node_ids() {
        for succ in graph.successors(node) {
            // Both endpoints come from `graph`, so they are always in range.
            let _ = inverted.add_edge(succ, node);
        }
    }
    inverted
}

/// Computes the postdominator tree of `graph`.
///
/// A virtual exit node with index `graph.node_count()` is appended; every
/// node without successors becomes one of its predecessors. The dominator
/// tree of the inverted graph rooted at that node is returned. Nodes that
/// cannot reach any exit (for example the body of an infinite loop) are
/// unreachable in the result.
pub fn compute_postdominators<G: Successors>(graph: &G) -> DominatorTree {
    let mut inverted = invert(graph);
    let exit = inverted.add_node();
    for node in graph.node_ids() {
        if graph.successors(node).next().is_none() {
            let _ = inverted.add_edge(exit, node);
        }
    }
    inverted.set_entry(exit);
    compute_dominators_rooted(&inverted)
}
