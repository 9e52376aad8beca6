//! Error types for courtside-claim
//!
//! Request failures and network failures are distinct variants but call
//! sites treat them identically: both surface a message and leave the
//! workflow recoverable.

use courtside_common::api::EntityId;
use thiserror::Error;

use crate::submitter::TransitionError;

/// Claim workflow error type
#[derive(Debug, Error)]
pub enum ClaimError {
    /// Server unreachable or connection dropped
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP response; `message` comes from the server body
    #[error("{message}")]
    Request { status: u16, message: String },

    /// Config or payload error from courtside-common
    #[error(transparent)]
    Common(#[from] courtside_common::Error),

    /// Client-side validation failure; never sent to the server
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Illegal submitter state transition
    #[error("Invalid transition: {0}")]
    Transition(#[from] TransitionError),

    /// Same mutation already in flight
    #[error("A {0} request is already in progress")]
    MutationPending(String),

    /// Two flattened units share a key
    #[error("Duplicate unit key: {0}")]
    DuplicateUnitKey(String),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    #[error("Unknown player: {0}")]
    UnknownPlayer(EntityId),
}

impl ClaimError {
    /// True for failures reported by or on the way to the server
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            ClaimError::Network(_)
                | ClaimError::Request { .. }
                | ClaimError::Common(courtside_common::Error::MalformedPayload { .. })
        )
    }

    /// Text shown to the guardian in a notification
    pub fn user_message(&self) -> String {
        match self {
            ClaimError::Request { message, .. } => message.clone(),
            ClaimError::Network(_) => "Could not reach the league server".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type for claim operations
pub type ClaimResult<T> = Result<T, ClaimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_shows_server_message() {
        let err = ClaimError::Request {
            status: 409,
            message: "Unit already claimed".to_string(),
        };
        assert_eq!(err.user_message(), "Unit already claimed");
        assert!(err.is_request_failure());
    }

    #[test]
    fn test_network_and_request_both_request_failures() {
        assert!(ClaimError::Network("reset".to_string()).is_request_failure());
        assert!(!ClaimError::Validation("first name".to_string()).is_request_failure());
    }
}
