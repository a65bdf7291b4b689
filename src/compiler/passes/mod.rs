//! Built-in program passes.
//!
//! Passes run in the order listed; each one leaves every program valid.
//!
//! | Pass | Effect |
//! |------|--------|
//! | [`UnwrapMotionPass`] | Moves array unwraps next to their array's definition |
//! | [`LoopInversionPass`] | Rotates `while` loops into guarded `do`/`while` loops |
//! | [`InliningPass`] | Replaces small statically bound calls with the callee's body |

mod inlining;
mod loopinv;
mod unwrap;

pub use inlining::{
    complexity, ClassInitReason, InlinedSite, InliningPass, InliningReport, PlanEntry,
    RejectReason, Rejection,
};
pub use loopinv::{InversionReport, LoopInversionPass, SkipReason};
pub use unwrap::UnwrapMotionPass;
