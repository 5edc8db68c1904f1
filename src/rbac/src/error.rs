//! Error types for the RBAC engine

use crate::config::IntegrityIssue;
use thiserror::Error;

/// Closed set of failure categories callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Forbidden,
    Conflict,
    NotFound,
    FailedPrecondition,
    Integrity,
    Config,
    Storage,
    Serialization,
    Io,
}

/// RBAC engine errors
#[derive(Debug, Error)]
pub enum RbacError {
    /// Missing or malformed value, wrong-shape bulk input, foreign entity
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Protected super role mutated outside privileged mode
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Duplicate entity or self-grant
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Referenced entity or edge is not in storage
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage binding is missing or already taken
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Configured grants reference undeclared roles or permissions
    #[error("Incorrect rules: {}", format_issues(.0))]
    Integrity(Vec<IntegrityIssue>),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RbacError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Config(_) => ErrorKind::Config,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

#[cfg(feature = "sled")]
impl From<sled::Error> for RbacError {
    fn from(err: sled::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

fn format_issues(issues: &[IntegrityIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for RBAC operations
pub type Result<T> = std::result::Result<T, RbacError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            RbacError::Forbidden("superadmin".into()).kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            RbacError::Conflict("admin".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            RbacError::NotFound("ghost".into()).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_error_display_carries_name() {
        let err = RbacError::NotFound("Role 'ghost' does not exist".into());
        assert!(err.to_string().contains("ghost"));
    }
}
