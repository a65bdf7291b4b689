//! Graph algorithms used by the analyses and transformation passes.

mod dominators;
mod traversal;

pub use dominators::{
    compute_dominators, compute_dominators_rooted, compute_postdominators, invert,
    DominatorIterator, DominatorTree,
};
pub use traversal::{postorder, reachable, reverse_postorder};
