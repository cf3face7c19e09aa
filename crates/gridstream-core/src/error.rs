//! Error types shared across the toolkit.
//!
//! [`StreamError`] is the single error hierarchy used by the transport
//! traits, the session wrappers, and the pipeline core. Startup errors
//! (connection, publishing, topic open) abort a pipeline run; per-stream
//! errors fail only the owning stream binding.

use thiserror::Error;

/// Errors that can occur while streaming telemetry.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Failed to reach the broker or dependency service.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a data format or configuration descriptor.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// The topic has been closed and can no longer carry messages.
    #[error("topic '{0}' closed")]
    TopicClosed(String),

    /// A feed referenced by id has not been bound on this session.
    #[error("feed '{0}' not bound")]
    FeedNotBound(String),

    /// The component is not in the expected lifecycle state.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// The expected state.
        expected: String,
        /// The actual state.
        actual: String,
    },

    /// A transform failed while processing a buffer.
    #[error("transform failed: {0}")]
    Transform(String),

    /// Descriptor serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// An internal error that doesn't fit other categories.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let err = StreamError::ConnectionFailed("broker unreachable".into());
        assert_eq!(err.to_string(), "connection failed: broker unreachable");

        let err = StreamError::TopicClosed("SinCos".into());
        assert_eq!(err.to_string(), "topic 'SinCos' closed");
    }

    #[test]
    fn invalid_state_names_both_states() {
        let err = StreamError::InvalidState {
            expected: "Running".into(),
            actual: "Stopped".into(),
        };
        assert!(err.to_string().contains("Running"));
        assert!(err.to_string().contains("Stopped"));
    }

    #[test]
    fn serde_error_converts() {
        let bad: Result<serde_json::Value, _> = serde_json::from_str("{nope");
        let err: StreamError = bad.unwrap_err().into();
        assert!(matches!(err, StreamError::Serialization(_)));
    }
}
