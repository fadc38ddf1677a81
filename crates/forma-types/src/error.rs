//! Error types for the Forma engine.
//!
//! All crates return `FormaResult<T>` from fallible operations.

use thiserror::Error;

/// Unified error type for the Forma engine.
#[derive(Debug, Error)]
pub enum FormaError {
    /// Design document is malformed or has the wrong root/version.
    #[error("Invalid design: {0}")]
    InvalidDesign(String),

    /// Configuration value is out of valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A graph entity id does not resolve to a live arena slot.
    #[error("Stale {kind} id {index}")]
    StaleId {
        kind: &'static str,
        index: u32,
    },

    /// A graph mutation violated a structural invariant.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Export pipeline failure (polygonizer or STL writer).
    #[error("Export error: {0}")]
    Export(String),
}

/// Convenience alias for `Result<T, FormaError>`.
pub type FormaResult<T> = Result<T, FormaError>;
