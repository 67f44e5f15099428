//! Error taxonomy for broker interactions.
//!
//! Each kind carries its own retry policy:
//! - `ConnectError`: transient, retried inside `SessionManager::connect` up
//!   to the configured attempt budget.
//! - `PublishError::SessionUnavailable`: caller re-establishes the session
//!   through the manager before retrying.
//! - `PublishError::Encoding` / `HandleError::Decode`: permanent, never
//!   retried. On the consume side a decode failure drops the delivery.
//! - `HandleError::Process`: transient, the delivery is requeued.

use thiserror::Error;

/// Failure to establish or operate a broker session.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// A single broker operation failed (connection refused, channel lost,
    /// protocol error).
    #[error("broker operation failed: {0}")]
    Broker(#[from] lapin::Error),

    /// The configured connect attempt budget was spent without obtaining a
    /// usable session. Carries the last broker error observed.
    #[error("broker unreachable after {attempts} attempts: {source}")]
    AttemptsExhausted { attempts: u32, source: lapin::Error },
}

/// Failure to publish one message.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The session is not usable; the caller must obtain a fresh one from
    /// the session manager before retrying. The broker was not contacted.
    #[error("session is not usable for publishing")]
    SessionUnavailable,

    /// The message could not be serialized. Permanent; retrying the same
    /// message cannot succeed.
    #[error("failed to encode message: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The broker rejected or lost the publish.
    #[error("broker publish failed: {0}")]
    Broker(#[from] lapin::Error),
}

/// Failure inside the processing step applied to a delivered message.
#[derive(Debug, Error)]
#[error("message processing failed: {reason}")]
pub struct ProcessingError {
    pub reason: String,
}

impl ProcessingError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Classification of one delivery's handling outcome on the consumer side.
#[derive(Debug, Error)]
pub enum HandleError {
    /// The body is not a valid message. Permanent; the delivery is dropped
    /// rather than redelivered forever.
    #[error("failed to decode message body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The processing step failed. Transient; the delivery is requeued.
    #[error(transparent)]
    Process(#[from] ProcessingError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_unavailable_display() {
        let err = PublishError::SessionUnavailable;
        assert_eq!(err.to_string(), "session is not usable for publishing");
    }

    #[test]
    fn test_attempts_exhausted_display_names_budget() {
        let err = ConnectError::AttemptsExhausted {
            attempts: 5,
            source: lapin::Error::ChannelsLimitReached,
        };
        assert!(err.to_string().contains("after 5 attempts"));
    }

    #[test]
    fn test_decode_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = HandleError::from(serde_err);
        assert!(matches!(err, HandleError::Decode(_)));
        assert!(err.to_string().contains("decode"));
    }

    #[test]
    fn test_processing_error_is_transparent_through_handle_error() {
        let err = HandleError::from(ProcessingError::new("downstream timed out"));
        assert_eq!(err.to_string(), "message processing failed: downstream timed out");
    }
}
