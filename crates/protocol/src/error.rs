//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Response does not have the fixed TEMPer2 report length
    #[error("Incomplete response: expected {expected} bytes, got {actual}")]
    IncompleteResponse { expected: usize, actual: usize },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
