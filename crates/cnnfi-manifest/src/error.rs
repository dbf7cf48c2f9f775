//! Error types for manifest parsing and validation

use thiserror::Error;

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, ManifestError>;

/// Errors that can occur during manifest operations
#[derive(Debug, Error)]
pub enum ManifestError {
    /// I/O error reading or writing the manifest file
    #[error("I/O error: {0}")]
    Io(String),

    /// TOML parsing error
    #[error("Failed to parse manifest: {0}")]
    Parse(String),

    /// TOML serialization error
    #[error("Failed to serialize manifest: {0}")]
    Serialize(String),

    /// Invalid project name
    #[error("Invalid project name: {0}")]
    InvalidProjectName(String),

    /// Invalid layer entry
    #[error("Invalid layer '{0}': {1}")]
    InvalidLayer(String, String),

    /// Invalid hardware register entry
    #[error("Invalid register '{0}': {1}")]
    InvalidRegister(String, String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}
