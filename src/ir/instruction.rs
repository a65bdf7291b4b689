//! The instruction set of the program model.
//!
//! [`Instruction`] is a closed sum type: every pass matches it exhaustively, so
//! adding an instruction kind is a compile error everywhere it has not been
//! handled yet. The set is intentionally small. It covers what the
//! transformation passes must reason about (calls, class initialization, array
//! unwrapping, terminators) plus enough arithmetic to write meaningful test
//! programs for the interpreter.
//!
//! # Field naming
//!
//! - `dest`: the variable receiving the result
//! - `left`, `right`: binary operands
//! - `operand`: unary operand
//! - `array`, `index`, `value`: array element access
//! - `target`, `true_target`, `false_target`, `default`: successor blocks

#![allow(missing_docs)]

use std::fmt;

use strum::{Display, EnumIter};

use crate::ir::{BlockId, VarId};

/// Name of the constructor method, as used by [`MethodRef::is_constructor`].
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Reference to a method by owning class, name and descriptor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodRef {
    /// Fully qualified name of the declaring class
    pub class_name: String,
    /// Simple method name
    pub name: String,
    /// Method descriptor, e.g. `(II)I`
    pub descriptor: String,
}

impl MethodRef {
    /// Creates a method reference.
    pub fn new(
        class_name: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        MethodRef {
            class_name: class_name.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Returns `true` if this reference names an instance constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.class_name, self.name, self.descriptor)
    }
}

/// How a call selects its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum InvocationKind {
    /// Direct call without a receiver instance
    Static,
    /// Direct call on an instance (constructors, private methods, super calls)
    Special,
    /// Dispatch through the receiver's runtime type
    Virtual,
}

/// Arithmetic and bitwise operations on integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    /// Wrapping addition
    Add,
    /// Wrapping subtraction
    Sub,
    /// Wrapping multiplication
    Mul,
    /// Division, raising on a zero divisor
    Div,
    /// Remainder, raising on a zero divisor
    Rem,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise exclusive or
    Xor,
    /// Left shift
    Shl,
    /// Arithmetic right shift
    Shr,
    /// Three-way comparison producing -1, 0 or 1
    Compare,
}

/// Condition of a branch testing a single operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum BranchCondition {
    /// `operand == 0`
    Equal,
    /// `operand != 0`
    NotEqual,
    /// `operand < 0`
    Less,
    /// `operand <= 0`
    LessOrEqual,
    /// `operand > 0`
    Greater,
    /// `operand >= 0`
    GreaterOrEqual,
    /// `operand` is null
    Null,
    /// `operand` is not null
    NotNull,
}

/// Condition of a branch comparing two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryBranchCondition {
    /// `left == right`
    Equal,
    /// `left != right`
    NotEqual,
    /// `left < right`
    Less,
    /// `left <= right`
    LessOrEqual,
    /// `left > right`
    Greater,
    /// `left >= right`
    GreaterOrEqual,
    /// Both operands reference the same object
    ReferenceEqual,
    /// The operands reference different objects
    ReferenceNotEqual,
}

/// Element type of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ElementType {
    /// 8-bit integer
    Byte,
    /// 16-bit integer
    Short,
    /// UTF-16 code unit
    Char,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// Object reference
    Object,
}

/// One arm of a [`Instruction::Switch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCase {
    /// Value selecting this arm
    pub value: i64,
    /// Block executed for `value`
    pub target: BlockId,
}

/// A single instruction of a basic block.
///
/// The last instruction of every block is a terminator
/// ([`Instruction::is_terminator`]); no other instruction may be one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Does nothing. Left behind where an instruction was removed in place.
    Nop,
    /// `dest = value`
    Const { dest: VarId, value: i64 },
    /// `dest = null`
    Null { dest: VarId },
    /// `dest = src`
    Copy { dest: VarId, src: VarId },
    /// `dest = left <op> right`
    Binary {
        dest: VarId,
        op: BinaryOp,
        left: VarId,
        right: VarId,
    },
    /// `dest = -operand`
    Neg { dest: VarId, operand: VarId },
    /// `dest = new element[size]`
    NewArray {
        dest: VarId,
        element: ElementType,
        size: VarId,
    },
    /// `dest = unwrap(array)`: exposes the raw element storage of an array
    /// object. Must stay adjacent to the definition of `array`.
    UnwrapArray {
        dest: VarId,
        array: VarId,
        element: ElementType,
    },
    /// `dest = array[index]`
    LoadElement {
        dest: VarId,
        array: VarId,
        index: VarId,
    },
    /// `array[index] = value`
    StoreElement {
        array: VarId,
        index: VarId,
        value: VarId,
    },
    /// `dest = array.length`
    ArrayLength { dest: VarId, array: VarId },
    /// Method call.
    Invoke {
        dest: Option<VarId>,
        instance: Option<VarId>,
        method: MethodRef,
        arguments: Vec<VarId>,
        kind: InvocationKind,
    },
    /// Runs the static initializer of `class_name` if it has not run yet.
    InitClass { class_name: String },
    /// Unconditional transfer.
    Jump { target: BlockId },
    /// Branch on a single operand.
    Branch {
        condition: BranchCondition,
        operand: VarId,
        true_target: BlockId,
        false_target: BlockId,
    },
    /// Branch comparing two operands.
    BinaryBranch {
        condition: BinaryBranchCondition,
        left: VarId,
        right: VarId,
        true_target: BlockId,
        false_target: BlockId,
    },
    /// Multi-way branch.
    Switch {
        value: VarId,
        cases: Vec<SwitchCase>,
        default: BlockId,
    },
    /// Leaves the method, optionally returning a value.
    Return { value: Option<VarId> },
    /// Raises `exception`, transferring control to the first try/catch
    /// handler of the block or out of the method.
    Throw { exception: VarId },
}

impl Instruction {
    /// Returns the variable this instruction defines, if any.
    #[must_use]
    pub fn dest(&self) -> Option<VarId> {
        match self {
            Self::Const { dest, .. }
            | Self::Null { dest }
            | Self::Copy { dest, .. }
            | Self::Binary { dest, .. }
            | Self::Neg { dest, .. }
            | Self::NewArray { dest, .. }
            | Self::UnwrapArray { dest, .. }
            | Self::LoadElement { dest, .. }
            | Self::ArrayLength { dest, .. } => Some(*dest),

            Self::Invoke { dest, .. } => *dest,

            Self::Nop
            | Self::StoreElement { .. }
            | Self::InitClass { .. }
            | Self::Jump { .. }
            | Self::Branch { .. }
            | Self::BinaryBranch { .. }
            | Self::Switch { .. }
            | Self::Return { .. }
            | Self::Throw { .. } => None,
        }
    }

    /// Returns every variable read by this instruction, in operand order.
    #[must_use]
    pub fn uses(&self) -> Vec<VarId> {
        match self {
            Self::Nop
            | Self::Const { .. }
            | Self::Null { .. }
            | Self::InitClass { .. }
            | Self::Jump { .. } => vec![],

            Self::Copy { src, .. } => vec![*src],
            Self::Binary { left, right, .. } | Self::BinaryBranch { left, right, .. } => {
                vec![*left, *right]
            }
            Self::Neg { operand, .. } | Self::Branch { operand, .. } => vec![*operand],
            Self::NewArray { size, .. } => vec![*size],
            Self::UnwrapArray { array, .. } | Self::ArrayLength { array, .. } => vec![*array],
            Self::LoadElement { array, index, .. } => vec![*array, *index],
            Self::StoreElement {
                array,
                index,
                value,
            } => vec![*array, *index, *value],
            Self::Invoke {
                instance,
                arguments,
                ..
            } => instance.iter().chain(arguments.iter()).copied().collect(),
            Self::Switch { value, .. } => vec![*value],
            Self::Return { value } => value.iter().copied().collect(),
            Self::Throw { exception } => vec![*exception],
        }
    }

    /// Rewrites every variable this instruction reads.
    pub fn map_uses(&mut self, mut f: impl FnMut(VarId) -> VarId) {
        match self {
            Self::Nop
            | Self::Const { .. }
            | Self::Null { .. }
            | Self::InitClass { .. }
            | Self::Jump { .. } => {}

            Self::Copy { src, .. } => *src = f(*src),
            Self::Binary { left, right, .. } | Self::BinaryBranch { left, right, .. } => {
                *left = f(*left);
                *right = f(*right);
            }
            Self::Neg { operand, .. } | Self::Branch { operand, .. } => *operand = f(*operand),
            Self::NewArray { size, .. } => *size = f(*size),
            Self::UnwrapArray { array, .. } | Self::ArrayLength { array, .. } => {
                *array = f(*array);
            }
            Self::LoadElement { array, index, .. } => {
                *array = f(*array);
                *index = f(*index);
            }
            Self::StoreElement {
                array,
                index,
                value,
            } => {
                *array = f(*array);
                *index = f(*index);
                *value = f(*value);
            }
            Self::Invoke {
                instance,
                arguments,
                ..
            } => {
                if let Some(instance) = instance {
                    *instance = f(*instance);
                }
                for argument in arguments {
                    *argument = f(*argument);
                }
            }
            Self::Switch { value, .. } => *value = f(*value),
            Self::Return { value } => {
                if let Some(value) = value {
                    *value = f(*value);
                }
            }
            Self::Throw { exception } => *exception = f(*exception),
        }
    }

    /// Rewrites the variable this instruction defines.
    pub fn map_dest(&mut self, f: impl FnOnce(VarId) -> VarId) {
        match self {
            Self::Const { dest, .. }
            | Self::Null { dest }
            | Self::Copy { dest, .. }
            | Self::Binary { dest, .. }
            | Self::Neg { dest, .. }
            | Self::NewArray { dest, .. }
            | Self::UnwrapArray { dest, .. }
            | Self::LoadElement { dest, .. }
            | Self::ArrayLength { dest, .. } => *dest = f(*dest),
            Self::Invoke {
                dest: Some(dest), ..
            } => *dest = f(*dest),
            _ => {}
        }
    }

    /// Returns the successor blocks of a terminator in operand order.
    ///
    /// Non-terminators, returns and throws have no explicit successors.
    /// Duplicate targets are kept.
    #[must_use]
    pub fn targets(&self) -> Vec<BlockId> {
        match self {
            Self::Jump { target } => vec![*target],
            Self::Branch {
                true_target,
                false_target,
                ..
            }
            | Self::BinaryBranch {
                true_target,
                false_target,
                ..
            } => vec![*true_target, *false_target],
            Self::Switch { cases, default, .. } => cases
                .iter()
                .map(|case| case.target)
                .chain(std::iter::once(*default))
                .collect(),
            _ => vec![],
        }
    }

    /// Rewrites every successor block of a terminator.
    pub fn map_targets(&mut self, mut f: impl FnMut(BlockId) -> BlockId) {
        match self {
            Self::Jump { target } => *target = f(*target),
            Self::Branch {
                true_target,
                false_target,
                ..
            }
            | Self::BinaryBranch {
                true_target,
                false_target,
                ..
            } => {
                *true_target = f(*true_target);
                *false_target = f(*false_target);
            }
            Self::Switch { cases, default, .. } => {
                for case in cases {
                    case.target = f(case.target);
                }
                *default = f(*default);
            }
            _ => {}
        }
    }

    /// Returns `true` if this instruction must end a block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Jump { .. }
                | Self::Branch { .. }
                | Self::BinaryBranch { .. }
                | Self::Switch { .. }
                | Self::Return { .. }
                | Self::Throw { .. }
        )
    }

    /// Returns `true` for [`Instruction::Nop`].
    #[must_use]
    pub fn is_nop(&self) -> bool {
        matches!(self, Self::Nop)
    }
}
