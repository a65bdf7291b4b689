//! Program model: a method body as basic blocks over a flat variable space.
//!
//! Blocks and variables live in arenas owned by [`Program`] and are referred
//! to by [`BlockId`] and [`VarId`] indices. Copying a region means allocating
//! a parallel index range and running a [`Remapper`] over the copied blocks;
//! nothing holds pointers into the arenas.
//!
//! # Key Types
//!
//! - [`Program`] - Blocks and variables of one method body
//! - [`BasicBlock`] - Phis, instructions and try/catch regions
//! - [`Instruction`] - Closed set of operations and terminators
//! - [`Phi`] - Value merge at block entry
//! - [`Remapper`] - Total rewriting of block and variable references
//! - [`ProgramBuilder`] - Convenient construction for front ends and tests
//!
//! # Checking and Executing
//!
//! [`verify`] checks the structural invariants every pass must preserve.
//! [`Interpreter`] executes a program, which is how the passes are tested
//! for semantic equivalence. [`SsaUpdater`] restores single definitions after
//! a region was duplicated.

mod block;
mod builder;
mod display;
mod id;
mod instruction;
mod interpreter;
mod phi;
mod program;
mod remap;
mod updater;
mod variable;
mod verify;

pub use block::{BasicBlock, TryCatch};
pub use builder::ProgramBuilder;
pub use id::{BlockId, VarId};
pub use instruction::{
    BinaryBranchCondition, BinaryOp, BranchCondition, ElementType, Instruction, InvocationKind,
    MethodRef, SwitchCase, CONSTRUCTOR_NAME,
};
pub use interpreter::{
    ArrayRef, Execution, Interpreter, Outcome, Value, ARITHMETIC_EXCEPTION, INDEX_EXCEPTION,
    NEGATIVE_SIZE_EXCEPTION, NULL_POINTER_EXCEPTION,
};
pub use phi::{Incoming, Phi};
pub use program::Program;
pub use remap::{BlockMapper, CopyTable, ProgramMapper, Remapper, VariableMapper};
pub use updater::SsaUpdater;
pub use variable::Variable;
pub use verify::verify;
