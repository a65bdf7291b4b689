//! Shared state of one optimization run.
//!
//! The [`CompilerContext`] owns the programs being optimized, the class
//! source used to resolve call targets, the configuration and the event log.
//! All collection fields are thread-safe so that distinct methods can be
//! processed in parallel.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};

use crate::{
    compiler::{ClassSource, EventLog, OptimizerConfig},
    ir::{MethodRef, Program},
};

/// Compiler context for the optimization pipeline.
pub struct CompilerContext {
    /// Program of each method (mutated by passes).
    pub programs: DashMap<MethodRef, Program>,

    /// Methods whose program was changed by at least one pass.
    pub processed_methods: DashSet<MethodRef>,

    /// Accumulated events from all passes.
    pub events: EventLog,

    /// Lookup of call targets.
    classes: Arc<dyn ClassSource>,

    /// Pipeline settings.
    config: OptimizerConfig,
}

impl CompilerContext {
    /// Creates a context without programs.
    #[must_use]
    pub fn new(classes: Arc<dyn ClassSource>, config: OptimizerConfig) -> Self {
        Self {
            programs: DashMap::new(),
            processed_methods: DashSet::new(),
            events: EventLog::new(),
            classes,
            config,
        }
    }

    /// Returns the class source.
    #[must_use]
    pub fn classes(&self) -> &dyn ClassSource {
        self.classes.as_ref()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Registers the program of a method, replacing any previous one.
    pub fn add_program(&self, method: MethodRef, program: Program) {
        self.programs.insert(method, program);
    }

    /// Returns a copy of the current program of `method`.
    #[must_use]
    pub fn program(&self, method: &MethodRef) -> Option<Program> {
        self.programs.get(method).map(|entry| entry.value().clone())
    }

    /// Removes and returns the program of `method`.
    pub fn take_program(&self, method: &MethodRef) -> Option<Program> {
        self.programs.remove(method).map(|(_, program)| program)
    }

    /// Returns the registered methods in a stable order.
    #[must_use]
    pub fn methods(&self) -> Vec<MethodRef> {
        let mut methods: Vec<MethodRef> =
            self.programs.iter().map(|entry| entry.key().clone()).collect();
        methods.sort();
        methods
    }

    /// Returns `true` if a pass changed the program of `method`.
    #[must_use]
    pub fn is_processed(&self, method: &MethodRef) -> bool {
        self.processed_methods.contains(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compiler::ClassRepository, ir::ProgramBuilder};

    #[test]
    fn test_program_registry() {
        let ctx = CompilerContext::new(Arc::new(ClassRepository::new()), OptimizerConfig::new());
        let b_method = MethodRef::new("demo.B", "f", "()V");
        let a_method = MethodRef::new("demo.A", "f", "()V");

        let mut builder = ProgramBuilder::new(0);
        let entry = builder.block();
        builder.ret(entry, None);
        let program = builder.build();

        ctx.add_program(b_method.clone(), program.clone());
        ctx.add_program(a_method.clone(), program.clone());

        assert_eq!(ctx.methods(), vec![a_method.clone(), b_method.clone()]);
        assert_eq!(ctx.program(&a_method), Some(program.clone()));
        assert_eq!(ctx.take_program(&a_method), Some(program));
        assert!(ctx.program(&a_method).is_none());
        assert!(!ctx.is_processed(&b_method));
        assert!(ctx.config().inline_calls);
        assert!(ctx.classes().class("demo.A").is_none());
    }
}
