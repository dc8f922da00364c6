//! BlackBox error types

use thiserror::Error;

/// BlackBox error type
#[derive(Error, Debug)]
pub enum Error {
    /// Request refused by the policy engine before the agent was invoked
    #[error("Policy rejected request '{request_id}': {reason}")]
    PolicyRejected { request_id: String, reason: String },

    /// Malformed request (e.g. empty request id)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An outcome with this request id already exists
    #[error("Duplicate request id: {0}")]
    DuplicateRequest(String),

    /// A redaction pattern failed to compile or violates catalog rules
    #[error("Pattern '{name}' rejected: {reason}")]
    PatternCompile { name: String, reason: String },

    /// No stored outcome for the request id
    #[error("Outcome not found: {0}")]
    NotFound(String),

    /// The storage backend failed to append or look up an outcome
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for BlackBox operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejected_message() {
        let err = Error::PolicyRejected {
            request_id: "req-1".to_string(),
            reason: "estimated cost 5 exceeds ceiling 0".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("req-1"));
        assert!(msg.contains("exceeds ceiling"));
    }

    #[test]
    fn test_from_serde_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
