//! Depth-first traversal orders.
//!
//! Reverse postorder is the iteration order of the dominator computation and
//! of every forward data-flow walk in this crate; postorder is its mirror.
//! All traversals are iterative so deeply nested programs cannot overflow the
//! call stack.

use crate::utils::graph::{NodeId, Successors};

/// Computes the postorder of the nodes reachable from `start`.
///
/// Successors are explored in the order the graph yields them. An invalid
/// `start` yields an empty order.
///
/// # Examples
///
/// ```rust
/// use optiscope::utils::graph::{algorithms::postorder, DirectedGraph, NodeId};
///
/// let mut graph = DirectedGraph::with_nodes(3);
/// graph.add_edge(NodeId::new(0), NodeId::new(1))?;
/// graph.add_edge(NodeId::new(1), NodeId::new(2))?;
/// let order = postorder(&graph, NodeId::new(0));
/// assert_eq!(order, vec![NodeId::new(2), NodeId::new(1), NodeId::new(0)]);
/// # Ok::<(), optiscope::Error>(())
/// ```
#[allow(clippy::items_after_statements)]
pub fn postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let node_count = graph.node_count();
    if start.index() >= node_count {
        return Vec::new();
    }

    #[derive(Clone, Copy)]
    enum State {
        Enter,
        Exit,
    }

    let mut visited = vec![false; node_count];
    let mut result = Vec::with_capacity(node_count);
    let mut stack = vec![(start, State::Enter)];

    while let Some((node, state)) = stack.pop() {
        match state {
            State::Enter => {
                if visited[node.index()] {
                    continue;
                }
                visited[node.index()] = true;
                stack.push((node, State::Exit));

                let successors: Vec<NodeId> = graph.successors(node).collect();
                for &succ in successors.iter().rev() {
                    if !visited[succ.index()] {
                        stack.push((succ, State::Enter));
                    }
                }
            }
            State::Exit => result.push(node),
        }
    }

    result
}

/// Computes the reverse postorder of the nodes reachable from `start`.
///
/// In reverse postorder every node precedes its successors along forward
/// (non-back) edges.
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut result = postorder(graph, start);
    result.reverse();
    result
}

/// Returns a membership vector of the nodes reachable from `start`.
pub fn reachable<G: Successors>(graph: &G, start: NodeId) -> Vec<bool> {
    let mut seen = vec![false; graph.node_count()];
    if start.index() >= seen.len() {
        return seen;
    }

    let mut stack = vec![start];
    seen[start.index()] = true;
    while let Some(node) = stack.pop() {
        for succ in graph.successors(node) {
            if !seen[succ.index()] {
                seen[succ.index()] = true;
                stack.push(succ);
            }
        }
    }
    seen
}
