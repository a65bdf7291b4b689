//! Natural loop detection and nesting.
//!
//! A back edge is an edge whose target dominates its source. Every back edge
//! target is a loop header; its natural loop is the header plus every node
//! that reaches a back-edge source without passing through the header. Loops
//! sharing a header are merged.
//!
//! ```text
//!     [preheader]
//!          |
//!          v
//!     [header] <------+
//!          |          |
//!          v          |
//!     [body ...]      |
//!          |          |
//!          v          |
//!     [latch] --------+
//!          |
//!          v
//!     [exit ...]
//! ```
//!
//! Nesting follows body containment: the parent of a loop is the smallest
//! other loop whose body contains its header. Edges into the middle of a
//! cycle that bypass the header (irreducible flow) do not form loops here;
//! passes must check the shapes they rely on themselves.

use std::collections::{BTreeMap, BTreeSet};

use crate::utils::graph::{algorithms::DominatorTree, GraphBase, NodeId, Predecessors, Successors};

/// Index of a loop within a [`LoopForest`].
pub type LoopId = usize;

/// One natural loop.
#[derive(Debug, Clone)]
pub struct LoopInfo {
    /// The header block (single entry point, dominates all loop nodes).
    pub header: NodeId,

    /// All blocks in the loop body (including header), in index order.
    pub body: BTreeSet<NodeId>,

    /// Back edge sources (blocks that jump to the header from within the loop).
    pub latches: Vec<NodeId>,

    /// Loop blocks with at least one successor outside the loop.
    pub exits: Vec<NodeId>,

    /// Loop nesting depth (0 = outermost).
    pub depth: usize,

    /// Enclosing loop, if this loop is nested.
    pub parent: Option<LoopId>,

    /// Directly nested loops.
    pub children: Vec<LoopId>,
}

impl LoopInfo {
    fn new(header: NodeId) -> Self {
        LoopInfo {
            header,
            body: BTreeSet::from([header]),
            latches: Vec::new(),
            exits: Vec::new(),
            depth: 0,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Returns true if this loop contains the given block.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.body.contains(&node)
    }

    /// Returns the number of blocks in the loop.
    #[must_use]
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// All loops of one graph.
#[derive(Debug, Clone, Default)]
pub struct LoopForest {
    /// Loops ordered by header index.
    loops: Vec<LoopInfo>,
    /// Innermost loop per block.
    block_to_loop: Vec<Option<LoopId>>,
}

impl LoopForest {
    /// Returns all loops, ordered by header index.
    #[must_use]
    pub fn loops(&self) -> &[LoopInfo] {
        &self.loops
    }

    /// Returns the loop with the given index.
    #[must_use]
    pub fn get(&self, id: LoopId) -> Option<&LoopInfo> {
        self.loops.get(id)
    }

    /// Returns the number of loops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Returns true if there are no loops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Returns the innermost loop containing `node`.
    #[must_use]
    pub fn loop_at(&self, node: NodeId) -> Option<LoopId> {
        self.block_to_loop.get(node.index()).copied().flatten()
    }

    /// Returns the loop headed by `header`.
    #[must_use]
    pub fn loop_for_header(&self, header: NodeId) -> Option<LoopId> {
        self.loops.iter().position(|l| l.header == header)
    }

    /// Returns `true` if `inner` is `outer` or nested inside it.
    #[must_use]
    pub fn is_child_of(&self, inner: LoopId, outer: LoopId) -> bool {
        self.ancestors(inner).any(|id| id == outer)
    }

    /// Iterates from `id` outwards through its enclosing loops, `id` first.
    pub fn ancestors(&self, id: LoopId) -> impl Iterator<Item = LoopId> + '_ {
        std::iter::successors(
            (id < self.loops.len()).then_some(id),
            move |&current| self.loops[current].parent,
        )
    }
}

/// Detects all natural loops of `graph`.
///
/// # Arguments
///
/// * `graph` - Any graph implementing `GraphBase + Successors + Predecessors`
/// * `dominators` - Pre-computed dominator tree for the graph
#[must_use]
pub fn detect_loops<G>(graph: &G, dominators: &DominatorTree) -> LoopForest
where
    G: GraphBase + Successors + Predecessors,
{
    let mut by_header: BTreeMap<NodeId, LoopInfo> = BTreeMap::new();

    for node in graph.node_ids() {
        if !dominators.is_reachable(node) {
            continue;
        }
        for succ in graph.successors(node) {
            if dominators.dominates(succ, node) {
                let loop_info = by_header
                    .entry(succ)
                    .or_insert_with(|| LoopInfo::new(succ));
                loop_info.latches.push(node);
                expand_loop_body(graph, dominators, loop_info, node);
            }
        }
    }

    let mut loops: Vec<LoopInfo> = by_header.into_values().collect();
    for loop_info in &mut loops {
        loop_info.exits = loop_info
            .body
            .iter()
            .copied()
            .filter(|&node| graph.successors(node).any(|s| !loop_info.contains(s)))
            .collect();
    }

    compute_nesting(&mut loops);

    let mut block_to_loop: Vec<Option<LoopId>> = vec![None; graph.node_count()];
    for (id, loop_info) in loops.iter().enumerate() {
        for node in &loop_info.body {
            let slot = &mut block_to_loop[node.index()];
            let deeper = slot.map_or(true, |existing| loops[existing].depth < loop_info.depth);
            if deeper {
                *slot = Some(id);
            }
        }
    }

    LoopForest {
        loops,
        block_to_loop,
    }
}

fn expand_loop_body<G>(graph: &G, dominators: &DominatorTree, loop_info: &mut LoopInfo, latch: NodeId)
where
    G: Predecessors,
{
    let mut stack = vec![latch];
    while let Some(node) = stack.pop() {
        if !loop_info.body.insert(node) {
            continue;
        }
        for pred in graph.predecessors(node) {
            if dominators.is_reachable(pred) && !loop_info.body.contains(&pred) {
                stack.push(pred);
            }
        }
    }
}

fn compute_nesting(loops: &mut [LoopInfo]) {
    let count = loops.len();
    for inner in 0..count {
        let header = loops[inner].header;
        let parent = (0..count)
            .filter(|&outer| outer != inner && loops[outer].contains(header))
            .min_by_key(|&outer| loops[outer].size());
        loops[inner].parent = parent;
    }

    for id in 0..count {
        if let Some(parent) = loops[id].parent {
            loops[parent].children.push(id);
        }
        let mut depth = 0;
        let mut current = loops[id].parent;
        while let Some(parent) = current {
            depth += 1;
            current = loops[parent].parent;
        }
        loops[id].depth = depth;
    }
}
