//! Pass scheduler for running the optimization pipeline.
//!
//! The `PassScheduler` runs an ordered list of passes over every method of a
//! [`CompilerContext`]. Each pass finishes on all methods before the next one
//! starts, matching the pipeline order: unwrap motion, loop inversion,
//! inlining.

use rayon::prelude::*;

use crate::{
    compiler::{
        context::CompilerContext,
        pass::ProgramPass,
        passes::{InliningPass, LoopInversionPass, UnwrapMotionPass},
        EventKind, OptimizerConfig,
    },
    ir::{verify, MethodRef},
    Error, Result,
};

/// Orchestrates pass execution over all methods of a context.
pub struct PassScheduler {
    /// Passes in execution order.
    pub passes: Vec<Box<dyn ProgramPass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::from_config(&OptimizerConfig::default())
    }
}

impl PassScheduler {
    /// Creates a scheduler without passes.
    #[must_use]
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Creates the standard pipeline, leaving out passes disabled in `config`.
    #[must_use]
    pub fn from_config(config: &OptimizerConfig) -> Self {
        let mut scheduler = Self::new();
        if config.unwrap_motion {
            scheduler.add(Box::new(UnwrapMotionPass::new()));
        }
        if config.loop_inversion {
            scheduler.add(Box::new(
                LoopInversionPass::new(config.max_inversion_rounds)
                    .with_profitability(config.inversion_profitability),
            ));
        }
        if config.inline_calls {
            scheduler.add(Box::new(InliningPass::new(config.inlining.clone())));
        }
        scheduler
    }

    /// Appends a pass.
    pub fn add(&mut self, pass: Box<dyn ProgramPass>) {
        self.passes.push(pass);
    }

    /// Runs every pass once over every method.
    ///
    /// Returns `true` if any program changed. Methods are processed in
    /// parallel when the context's configuration asks for it.
    ///
    /// # Errors
    ///
    /// Returns the first error of any pass, or [`Error::Verification`] when
    /// verification is enabled and a pass left a program malformed. Programs
    /// are always returned to the context, also on error.
    pub fn run_pipeline(&self, ctx: &CompilerContext) -> Result<bool> {
        let methods = ctx.methods();
        let mut any_changed = false;

        for pass in &self.passes {
            ctx.events
                .record(EventKind::PassStarted)
                .pass(pass.name())
                .message(format!("{} on {} methods", pass.name(), methods.len()));

            let results: Vec<Result<bool>> = if ctx.config().parallel {
                methods
                    .par_iter()
                    .map(|method| Self::run_on(pass.as_ref(), method, ctx))
                    .collect()
            } else {
                methods
                    .iter()
                    .map(|method| Self::run_on(pass.as_ref(), method, ctx))
                    .collect()
            };

            let mut changed = 0;
            for result in results {
                if result? {
                    changed += 1;
                }
            }
            any_changed |= changed > 0;

            ctx.events
                .record(EventKind::PassCompleted)
                .pass(pass.name())
                .message(format!("{} changed {changed} methods", pass.name()));
        }

        Ok(any_changed)
    }

    fn run_on(pass: &dyn ProgramPass, method: &MethodRef, ctx: &CompilerContext) -> Result<bool> {
        if !pass.should_run(method, ctx) {
            return Ok(false);
        }

        // Remove the program (brief lock, then released)
        let Some(mut program) = ctx.take_program(method) else {
            return Ok(false);
        };

        let result = pass.run_on_method(&mut program, method, ctx);
        let verified = match result {
            Ok(true) if ctx.config().verify => verify(&program).map_err(|error| {
                Error::Verification(format!("{} broke {method}: {error}", pass.name()))
            }),
            _ => Ok(()),
        };

        ctx.add_program(method.clone(), program);

        let changed = result?;
        verified?;
        if changed {
            ctx.processed_methods.insert(method.clone());
        }
        Ok(changed)
    }
}
