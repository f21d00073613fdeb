//! # DomainError
//!
//! Centralized error handling for the content pipeline.
//! Every port returns this type so the consumer runtime can decide,
//! per failure, whether a message is worth redelivering.

use thiserror::Error;

/// The primary error type crossing every port boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Entity not found (e.g., content item, profile)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Collaborator unreachable or timed out (network, provider outage)
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Provider-side throttling
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Collaborator answered, but with nothing usable (null, empty, wrong dimension)
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Persistence failure (e.g., DB down, constraint violation)
    #[error("store error: {0}")]
    Store(String),

    /// Broker transport failure
    #[error("broker error: {0}")]
    Broker(String),

    /// A handler received a message for a topic it does not own
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// Validation failure (e.g., malformed payload)
    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Whether redelivering the same message may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DomainError::Unavailable(_)
                | DomainError::RateLimited(_)
                | DomainError::InvalidResponse(_)
                | DomainError::Store(_)
                | DomainError::Broker(_)
        )
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Validation(err.to_string())
    }
}

/// A specialized Result type for pipeline logic.
pub type DomainResult<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(DomainError::Unavailable("timeout".into()).is_transient());
        assert!(DomainError::RateLimited("429".into()).is_transient());
        assert!(DomainError::InvalidResponse("empty tags".into()).is_transient());
        assert!(!DomainError::UnexpectedMessage("tag".into()).is_transient());
        assert!(!DomainError::Validation("bad json".into()).is_transient());
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = DomainError::NotFound("Post".into(), "p-1".into());
        assert_eq!(err.to_string(), "Post not found with ID p-1");
    }
}
