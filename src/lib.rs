// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![deny(unsafe_code)]

//! # optiscope
//!
//! Program transformations over an SSA program model, and the debug
//! information that maps emitted code back to source.
//!
//! ## Features
//!
//! - **Program model** - Basic blocks, phis, try/catch regions and a flat variable space held in arenas
//! - **Dominance and loops** - Dominator and postdominator trees, natural loop forests
//! - **Array-unwrap motion** - Moves unwrap operations next to the array they unwrap
//! - **Loop inversion** - Rewrites `while (true) { cond; body }` into a guarded `do`-loop
//! - **Inlining** - Splices callee bodies into call sites under a complexity budget
//! - **Debug information** - Line tables with inlining, control-flow summaries, variable ranges,
//!   type layouts, a compact binary encoding and step-location queries
//!
//! ## Quick Start
//!
//! ```rust
//! use optiscope::prelude::*;
//!
//! // loop: i = 0; while (true) { if (i >= n) break; i = i + 1; } return i;
//! let mut b = ProgramBuilder::new(1);
//! let n = b.parameter(1);
//! let entry = b.block();
//! let head = b.block();
//! let body = b.block();
//! let exit = b.block();
//!
//! let zero = b.constant(entry, 0);
//! b.jump(entry, head);
//! let i = b.phi(head);
//! b.compare_branch(head, BinaryBranchCondition::GreaterOrEqual, i, n, exit, body);
//! let one = b.constant(body, 1);
//! let next = b.binary(body, BinaryOp::Add, i, one);
//! b.jump(body, head);
//! b.incoming(head, i, entry, zero);
//! b.incoming(head, i, body, next);
//! b.ret(exit, Some(i));
//! let mut program = b.build();
//!
//! let report = LoopInversionPass::new(4).apply(&mut program)?;
//! assert_eq!(report.inverted.len(), 1);
//! verify(&program)?;
//!
//! let result = Interpreter::new().run(&program, None, &[Value::Int(5)])?;
//! assert_eq!(result.outcome, Outcome::Returned(Some(Value::Int(5))));
//! # Ok::<(), optiscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - The program model, builder, verifier, SSA repair and a reference interpreter
//! - [`analysis`] - Control-flow graphs, dominators and loops over a [`ir::Program`]
//! - [`compiler`] - The passes, their configuration, scheduling and event log
//! - [`debuginfo`] - Debug information tables, builder, codec and stepping
//! - [`utils`] - Generic directed graphs and graph algorithms
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! Passes skip what they cannot transform and report it as events; errors are
//! reserved for broken inputs:
//!
//! ```rust
//! use optiscope::{debuginfo::DebugInfo, Error};
//!
//! match DebugInfo::read(b"OSDI\x07") {
//!     Err(Error::NotSupported) => println!("Unknown format version"),
//!     Err(Error::Malformed { message, .. }) => println!("Malformed input: {}", message),
//!     Err(e) => println!("Other error: {}", e),
//!     Ok(_) => unreachable!(),
//! }
//! ```
#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use optiscope::prelude::*;
///
/// let mut b = ProgramBuilder::new(0);
/// let entry = b.block();
/// b.ret(entry, None);
/// verify(&b.build())?;
/// # Ok::<(), optiscope::Error>(())
/// ```
pub mod prelude;

pub mod utils;

pub mod ir;

pub mod analysis;

pub mod compiler;

pub mod debuginfo;

/// `optiscope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust
/// use optiscope::{debuginfo::DebugInfo, Result};
///
/// fn decode(bytes: &[u8]) -> Result<DebugInfo> {
///     DebugInfo::read(bytes)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `optiscope` Error type
///
/// The main error type for all operations in this crate. See [`Error`] for
/// the individual variants.
pub use error::Error;
