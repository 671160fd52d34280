use thiserror::Error;

// ---------------------------------------------------------------------------
// StackError – everything the stacking pipeline can refuse to do
// ---------------------------------------------------------------------------

/// Convenient `Result` alias for library functions.
pub type StackResult<T> = Result<T, StackError>;

/// Errors raised by the library.
///
/// Configuration variants are returned before any array work starts.
/// The degenerate-data variants are returned instead of an all-missing
/// or all-zero composite.
#[derive(Debug, Error, PartialEq)]
pub enum StackError {
    /// A required option was not supplied.
    #[error("missing required option '{0}'")]
    MissingOption(&'static str),

    /// An option was supplied but its value is unusable.
    #[error("invalid value for '{field}': {reason}")]
    InvalidOption { field: &'static str, reason: String },

    /// `selection` was something other than `peaks` or `lines`.
    #[error("unknown selection '{0}', expected 'peaks' or 'lines'")]
    UnknownSelection(String),

    /// Two arrays that must share a length do not.
    #[error("{what}: {left} values vs {right} values")]
    ShapeMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    /// The simulated spectrum produced no candidate lines.
    #[error("no candidate lines found in the simulated spectrum")]
    NoCandidates,

    /// Every chunk was flagged before weighting.
    #[error("all {0} chunks were flagged, nothing left to stack")]
    AllFlagged(usize),

    /// No velocity-grid sample is covered by any surviving chunk.
    #[error("no surviving chunk covers the velocity grid")]
    NoCoverage,

    /// The velocity grid does not outlive edge trimming.
    #[error("velocity grid has {len} samples, need more than {min}")]
    GridTooShort { len: usize, min: usize },

    /// The composite has no usable noise level to normalise by.
    #[error("composite rms is zero or undefined")]
    ZeroNoise,
}

impl StackError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        StackError::InvalidOption {
            field,
            reason: reason.into(),
        }
    }

    /// Whether this error was raised by configuration checks rather than data.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            StackError::MissingOption(_)
                | StackError::InvalidOption { .. }
                | StackError::UnknownSelection(_)
                | StackError::ShapeMismatch { .. }
        )
    }
}
