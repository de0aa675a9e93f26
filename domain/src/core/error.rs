//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid instance id: {0}")]
    InvalidInstanceId(String),

    #[error("Unknown session: {0}")]
    UnknownSession(String),
}

impl DomainError {
    /// Check if this error refers to a session the user does not own
    pub fn is_unknown_session(&self) -> bool {
        matches!(self, DomainError::UnknownSession(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_session_display() {
        let error = DomainError::UnknownSession("ses_1".to_string());
        assert_eq!(error.to_string(), "Unknown session: ses_1");
    }

    #[test]
    fn test_is_unknown_session_check() {
        assert!(DomainError::UnknownSession("x".to_string()).is_unknown_session());
        assert!(!DomainError::InvalidInstanceId("".to_string()).is_unknown_session());
    }
}
