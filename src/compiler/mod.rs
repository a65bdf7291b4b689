//! Optimization pipeline over [`Program`](crate::ir::Program)s.
//!
//! This module sits between the program model and code emission:
//!
//! - [`crate::ir`] - program model, verification, interpreter
//! - [`crate::analysis`] - control-flow graphs and loop forests
//! - [`compiler`](self) - passes, scheduling, class lookup, events
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Compiler Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext              Shared state of one run            │
//! │    ├─ Programs                (one per method, DashMap)          │
//! │    ├─ ClassSource             (call target lookup)               │
//! │    └─ EventLog                (append-only, boxcar)              │
//! │                                                                  │
//! │  PassScheduler                Ordered execution                  │
//! │    ├─ unwrap-motion                                              │
//! │    ├─ loop-inversion          (fixed point, innermost first)     │
//! │    └─ inlining                (plan, then splice)                │
//! │    Each pass: take program → run → verify → put back             │
//! │                                                                  │
//! │  ProgramPass trait            Interface for all passes           │
//! │    └─ run_on_method()         Per-method transformation          │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use optiscope::compiler::{ClassRepository, CompilerContext, OptimizerConfig, PassScheduler};
//! use optiscope::ir::{MethodRef, ProgramBuilder};
//!
//! let mut b = ProgramBuilder::new(0);
//! let entry = b.block();
//! b.ret(entry, None);
//!
//! let config = OptimizerConfig::new().with_parallel(false);
//! let ctx = CompilerContext::new(Arc::new(ClassRepository::new()), config.clone());
//! ctx.add_program(MethodRef::new("demo.Main", "run", "()V"), b.build());
//!
//! let changed = PassScheduler::from_config(&config).run_pipeline(&ctx)?;
//! assert!(!changed);
//! # Ok::<(), optiscope::Error>(())
//! ```

mod classes;
mod config;
mod context;
mod events;
mod pass;
mod passes;
mod scheduler;

pub use classes::{ClassModel, ClassRepository, ClassSource, MethodModel, MethodModifiers};
pub use config::{InliningConfig, OptimizerConfig, DEFAULT_THRESHOLD, MAX_DEPTH};
pub use context::CompilerContext;
pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::ProgramPass;
pub use passes::{
    complexity, ClassInitReason, InlinedSite, InliningPass, InliningReport, InversionReport,
    LoopInversionPass, PlanEntry, RejectReason, Rejection, SkipReason, UnwrapMotionPass,
};
pub use scheduler::PassScheduler;
