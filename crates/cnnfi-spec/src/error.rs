//! Error types for fault specification and validation

use thiserror::Error;

/// Result type for fault specification operations
pub type Result<T> = std::result::Result<T, SpecError>;

/// Rejected input. Every variant names the offending field or value so the
/// caller can point at it directly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Required field absent or null
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// Required field present but empty
    #[error("field '{0}' must not be empty")]
    EmptyField(String),

    /// Required field holds NaN
    #[error("field '{0}' is not a number")]
    NanField(String),

    /// Field present but unusable
    #[error("invalid value for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// Bit index outside `[0, width)`
    #[error("bit index {index} out of range for {width}-bit value")]
    BitOutOfRange { index: i64, width: u8 },

    /// Position not addressable in the tensor shape
    #[error("position {position:?} is not valid for shape {shape:?}")]
    InvalidPosition { position: Vec<i64>, shape: Vec<usize> },

    /// Bit set contains an index outside `[0, width)`
    #[error("bit positions {bits:?} are not valid for a {width}-bit value")]
    InvalidBits { bits: Vec<i64>, width: u8 },

    /// Fault rate outside `[0, 1]`
    #[error("fault rate {0} must be within [0.0, 1.0]")]
    RateOutOfRange(f64),

    /// Noise standard deviation negative or not finite
    #[error("standard deviation {0} must be a finite, non-negative number")]
    InvalidStdDev(f64),

    /// Tensor shape with a zero dimension or no dimensions
    #[error("tensor shape {0:?} must have at least one dimension, all positive")]
    InvalidShape(Vec<usize>),

    /// Fault type name not recognised
    #[error("unknown fault type '{0}'")]
    UnknownFaultType(String),

    /// Fault type that the target cannot express
    #[error("fault type '{fault_type}' is not supported for {target}")]
    UnsupportedFaultType { fault_type: String, target: String },

    /// Hardware register name not present in the register catalog
    #[error("unknown hardware register '{0}'")]
    UnknownRegister(String),

    /// Hardware plan has nothing to inject
    #[error("at least one filter or bias fault is required")]
    EmptyHardwarePlan,

    /// Campaign sample count outside the accepted range
    #[error("number of samples {0} must be within 1..=1000")]
    SampleCountOutOfRange(u64),
}

/// Errors raised by fault specification operations
#[derive(Debug, Error)]
pub enum SpecError {
    /// Input rejected; the spec was left unchanged
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Layer already configured in this spec
    #[error("layer '{0}' is already configured")]
    DuplicateLayer(String),

    /// Layer not configured in this spec or not known to the layer catalog
    #[error("unknown layer '{0}'")]
    UnknownLayer(String),

    /// Operation not meaningful for the spec's domain
    #[error("operation '{operation}' is not available for {domain} fault specs")]
    WrongDomain {
        operation: &'static str,
        domain: &'static str,
    },

    /// Malformed JSON payload
    #[error("failed to parse fault payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpecError {
    /// Field-level validation failure (as opposed to a consistency error)
    pub fn is_validation(&self) -> bool {
        matches!(self, SpecError::Validation(_))
    }
}
