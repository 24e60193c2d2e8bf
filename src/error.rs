use thiserror::Error;

use crate::codec::CodecError;
use crate::encoding::EncodingError;
use crate::parameters::global::GlobalParameterError;
use crate::parameters::parameter::ParameterError;
use crate::uncertainty::bootstrap::BootstrapError;
use crate::uncertainty::value::UncertaintyError;

/// Error types for the itcfit-rs library.
#[derive(Error, Debug)]
pub enum ItcFitError {
    /// Error indicating a mismatch between a vector length and the number of
    /// fitting parameters it is supposed to describe.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error for parameter-related problems.
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    /// Error raised by the global parameter set.
    #[error("Global parameter error: {0}")]
    GlobalParameter(#[from] GlobalParameterError),

    /// Error raised by value-with-error construction.
    #[error("Uncertainty error: {0}")]
    Uncertainty(#[from] UncertaintyError),

    /// Error raised by a bootstrap run.
    #[error("Bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// Error raised while decoding a solver vector.
    #[error("Solver codec error: {0}")]
    Codec(#[from] CodecError),

    /// Error raised by the persisted-state text encoding.
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Error indicating the external solver failed to converge.
    #[error("Solver failed to converge: {0}")]
    ConvergenceFailure(String),

    /// Error during residual or model evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic error for cases that don't fit the other categories.
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for itcfit-rs operations.
pub type Result<T> = std::result::Result<T, ItcFitError>;

/// Extensions for converting from other error types.
impl From<String> for ItcFitError {
    fn from(s: String) -> Self {
        ItcFitError::Other(s)
    }
}

impl From<&str> for ItcFitError {
    fn from(s: &str) -> Self {
        ItcFitError::Other(s.to_string())
    }
}
