//! Graph infrastructure for control-flow analysis.
//!
//! The module is deliberately small: an adjacency-list [`DirectedGraph`], the
//! capability traits the algorithms are written against, and the algorithms
//! themselves (traversal orders, dominator and postdominator trees).
//!
//! # Key Components
//!
//! - [`NodeId`] - Dense, strongly-typed node index
//! - [`DirectedGraph`] - Adjacency lists in both directions
//! - [`GraphBase`], [`Successors`], [`Predecessors`], [`RootedGraph`] - Algorithm inputs
//! - [`algorithms`] - Traversals and dominance

pub mod algorithms;
mod directed;
mod node;
mod traits;

pub use directed::DirectedGraph;
pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};
