//! Program variables.

use crate::ir::VarId;

/// A variable slot of a program.
///
/// Variables carry no type; the optional debug name is what the front end
/// knew the slot as and survives copying (inlining, loop inversion).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Variable {
    /// Index of this variable
    pub id: VarId,
    /// Source-level name, if any
    pub debug_name: Option<String>,
}

impl Variable {
    /// Creates an unnamed variable.
    #[must_use]
    pub fn new(id: VarId) -> Self {
        Variable {
            id,
            debug_name: None,
        }
    }
}
