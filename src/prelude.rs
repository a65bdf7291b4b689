//! # optiscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the optiscope library. Import this module to get quick access to the essential
//! types for building programs, running passes and querying debug information.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all optiscope operations
pub use crate::Error;

/// The result type used throughout optiscope
pub use crate::Result;

// ================================================================================================
// Program Model
// ================================================================================================

/// Programs, blocks and their identifiers
pub use crate::ir::{BasicBlock, BlockId, Program, ProgramBuilder, TryCatch, VarId, Variable};

/// Instructions and their operands
pub use crate::ir::{
    BinaryBranchCondition, BinaryOp, BranchCondition, ElementType, Instruction, InvocationKind,
    MethodRef,
};

/// Value merges
pub use crate::ir::{Incoming, Phi};

/// Remapping and SSA repair
pub use crate::ir::{CopyTable, ProgramMapper, Remapper, SsaUpdater};

/// Verification and reference execution
pub use crate::ir::{verify, Execution, Interpreter, Outcome, Value};

// ================================================================================================
// Analysis
// ================================================================================================

/// Control-flow graphs and loops
pub use crate::analysis::{detect_loops, ControlFlowGraph, LoopForest, LoopInfo};

// ================================================================================================
// Compiler Pipeline
// ================================================================================================

/// Pass infrastructure
pub use crate::compiler::{
    CompilerContext, EventKind, EventLog, InliningConfig, OptimizerConfig, PassScheduler,
    ProgramPass,
};

/// Class lookup for call targets
pub use crate::compiler::{ClassModel, ClassRepository, ClassSource, MethodModel, MethodModifiers};

/// The passes
pub use crate::compiler::{InliningPass, LoopInversionPass, UnwrapMotionPass};

// ================================================================================================
// Debug Information
// ================================================================================================

/// Debug information and its construction
pub use crate::debuginfo::{DebugInfo, DebugInfoBuilder, Location, StepLocations, StepLocationsFinder};
