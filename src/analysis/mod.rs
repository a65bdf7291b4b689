//! Control-flow analyses over [`Program`](crate::ir::Program)s.
//!
//! - [`ControlFlowGraph`] - Block graph with its dominator tree
//! - [`LoopForest`] - Natural loops and their nesting

mod cfg;
mod loops;

pub use cfg::{build_graph, ControlFlowGraph};
pub use loops::{detect_loops, LoopForest, LoopId, LoopInfo};
