//! Shared utilities: graph data structures and algorithms, DOT output.

mod dot;
pub mod graph;

pub(crate) use dot::escape_dot;
