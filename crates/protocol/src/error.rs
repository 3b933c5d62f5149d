//! Protocol error types

use thiserror::Error;

/// Errors produced while encoding or decoding requests
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Request line is not valid JSON
    #[error("Malformed request: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Request line exceeds the framing cap
    #[error("Request too long: over {limit} bytes")]
    TooLong { limit: usize },

    /// I/O error while reading a request line
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_long_display() {
        let err = ProtocolError::TooLong { limit: 4096 };
        assert!(format!("{}", err).contains("4096"));
    }
}
