use thiserror::Error;

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most of the optimizer never fails: a loop that cannot be inverted or a call site that is too
/// expensive to inline is skipped, not reported as an error. Errors are reserved for inputs that
/// violate the structural contract of a [`crate::ir::Program`] or of a serialized
/// [`crate::debuginfo::DebugInfo`].
///
/// # Error Categories
///
/// ## Decoding Errors
/// - [`Error::Malformed`] - Corrupted or invalid debug-info encoding
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of the input
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::NotSupported`] - Unknown format version or section
///
/// ## Program Errors
/// - [`Error::GraphError`] - A control transfer references a block that does not exist
/// - [`Error::Verification`] - A program failed structural verification
/// - [`Error::ExecutionLimit`] - The reference interpreter ran out of fuel
/// - [`Error::RecursionLimit`] - Maximum call depth exceeded while interpreting
///
/// ## I/O Errors
/// - [`Error::FileError`] - Errors raised while writing dumps
///
/// # Examples
///
/// ```rust
/// use optiscope::{debuginfo::DebugInfo, Error};
///
/// match DebugInfo::read(&[]) {
///     Err(Error::Empty) => {}
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The encoded data is damaged or does not follow the expected layout.
    ///
    /// Carries the source location where the problem was detected so that
    /// decoder bugs and genuinely broken inputs can be told apart.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while decoding.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The requested format version or feature is not supported.
    #[error("This format version is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// Underlying I/O error while writing diagnostics.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Control-flow graph construction failed.
    ///
    /// Raised when an edge references a node that is not part of the graph,
    /// which always indicates a corrupted program.
    #[error("{0}")]
    GraphError(String),

    /// A program failed structural verification.
    ///
    /// The message names the offending block and the violated property (phi
    /// completeness, dominance of a use, dangling reference, ...).
    #[error("Verification failed: {0}")]
    Verification(String),

    /// The interpreter executed more steps than its fuel allowed.
    #[error("Execution did not finish within {0} steps")]
    ExecutionLimit(usize),

    /// Reached the maximum recursion level allowed.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),
}
