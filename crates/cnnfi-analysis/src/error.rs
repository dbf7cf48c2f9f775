//! Error types for campaign analysis

use crate::response::NumericFaultDetail;
use thiserror::Error;

/// Result type for campaign analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The inference engine overflowed while running the faulty model. The
    /// attempted prediction, if any, is unreliable.
    #[error("numeric overflow during faulty inference: {0}")]
    NumericOverflow(NumericFaultDetail),

    #[error("number of classes must be positive, got {0}")]
    InvalidNumClasses(u32),

    /// Response lacks a required result block
    #[error("campaign response is missing '{0}'")]
    MissingResults(&'static str),

    #[error("failed to parse campaign response: {0}")]
    Json(#[from] serde_json::Error),
}
