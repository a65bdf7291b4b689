//! The interface every transformation pass implements.

use crate::{
    compiler::CompilerContext,
    ir::{MethodRef, Program},
    Result,
};

/// A transformation applied to one method body at a time.
///
/// Passes are shared between worker threads, so they hold no per-method
/// state; everything a run needs comes from its arguments.
pub trait ProgramPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Short description of what the pass does.
    fn description(&self) -> &'static str {
        ""
    }

    /// Should this pass run on a specific method?
    ///
    /// Called before `run_on_method`. Override to skip methods that cannot
    /// benefit from the pass.
    fn should_run(&self, _method: &MethodRef, _ctx: &CompilerContext) -> bool {
        true
    }

    /// Runs the pass on a single method body.
    ///
    /// Returns `true` if the program changed. Events are recorded directly
    /// to `ctx.events`. Declining to transform a site is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the program is malformed in a way the pass cannot
    /// work around.
    fn run_on_method(
        &self,
        program: &mut Program,
        method: &MethodRef,
        ctx: &CompilerContext,
    ) -> Result<bool>;
}
