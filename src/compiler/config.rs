//! Configuration of the optimization pipeline.
//!
//! [`OptimizerConfig`] selects which passes run and bounds how much work they
//! may do. Every field has a sensible default; the `with_*` methods adjust
//! individual settings fluently.
//!
//! ```rust
//! use optiscope::compiler::{InliningConfig, OptimizerConfig};
//!
//! let config = OptimizerConfig::new()
//!     .with_parallel(false)
//!     .with_inlining(InliningConfig::new().with_threshold(20));
//! assert_eq!(config.inlining.threshold, 20);
//! assert_eq!(config.inlining.max_depth, 4);
//! ```

/// Default complexity budget for an inlined callee.
pub const DEFAULT_THRESHOLD: usize = 15;

/// Default nesting limit for inlining inside inlined code.
pub const MAX_DEPTH: usize = 4;

/// Settings of the inlining pass.
///
/// # Default Values
///
/// | Setting | Default Value |
/// |---------|---------------|
/// | `threshold` | 15 |
/// | `max_depth` | 4 |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InliningConfig {
    /// Base complexity budget.
    ///
    /// The effective budget at nesting depth `d` is `threshold - d`, raised
    /// by another `threshold` when the calling program is itself simpler
    /// than `threshold`.
    pub threshold: usize,

    /// Maximum nesting depth of inlined code.
    ///
    /// Call sites inside a callee inlined at this depth are not expanded.
    pub max_depth: usize,
}

impl Default for InliningConfig {
    fn default() -> Self {
        InliningConfig {
            threshold: DEFAULT_THRESHOLD,
            max_depth: MAX_DEPTH,
        }
    }
}

impl InliningConfig {
    /// Creates the default inlining settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base complexity budget.
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Settings of the whole pipeline.
///
/// # Default Values
///
/// | Setting | Default Value |
/// |---------|---------------|
/// | `unwrap_motion` | true |
/// | `loop_inversion` | true |
/// | `inlining` | enabled, [`InliningConfig::default`] |
/// | `max_inversion_rounds` | 64 |
/// | `inversion_profitability` | false |
/// | `verify` | `cfg!(debug_assertions)` |
/// | `parallel` | true |
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    /// Run array-unwrap motion.
    pub unwrap_motion: bool,

    /// Run loop inversion.
    pub loop_inversion: bool,

    /// Run inlining.
    pub inline_calls: bool,

    /// Inlining budget.
    pub inlining: InliningConfig,

    /// Upper bound on detection sweeps of the loop inversion fixed point.
    ///
    /// Every sweep that inverts something triggers another one; a program
    /// still changing after this many sweeps is left as it is.
    pub max_inversion_rounds: usize,

    /// Invert only loops whose body holds a loop-invariant instruction that
    /// may trap, which the guard then lets a later pass hoist.
    pub inversion_profitability: bool,

    /// Run the structural verifier after every pass.
    pub verify: bool,

    /// Process methods on the rayon thread pool.
    pub parallel: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            unwrap_motion: true,
            loop_inversion: true,
            inline_calls: true,
            inlining: InliningConfig::default(),
            max_inversion_rounds: 64,
            inversion_profitability: false,
            verify: cfg!(debug_assertions),
            parallel: true,
        }
    }
}

impl OptimizerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables array-unwrap motion.
    #[must_use]
    pub fn with_unwrap_motion(mut self, enabled: bool) -> Self {
        self.unwrap_motion = enabled;
        self
    }

    /// Enables or disables loop inversion.
    #[must_use]
    pub fn with_loop_inversion(mut self, enabled: bool) -> Self {
        self.loop_inversion = enabled;
        self
    }

    /// Enables or disables inlining.
    #[must_use]
    pub fn with_inline_calls(mut self, enabled: bool) -> Self {
        self.inline_calls = enabled;
        self
    }

    /// Replaces the inlining settings.
    #[must_use]
    pub fn with_inlining(mut self, inlining: InliningConfig) -> Self {
        self.inlining = inlining;
        self
    }

    /// Sets the bound on loop inversion sweeps.
    #[must_use]
    pub fn with_max_inversion_rounds(mut self, rounds: usize) -> Self {
        self.max_inversion_rounds = rounds;
        self
    }

    /// Enables or disables the profitability check of loop inversion.
    #[must_use]
    pub fn with_inversion_profitability(mut self, enabled: bool) -> Self {
        self.inversion_profitability = enabled;
        self
    }

    /// Enables or disables verification after each pass.
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Enables or disables parallel processing of methods.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
