//! Error types for VPS Panel

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the panel Error
pub type Result<T> = std::result::Result<T, Error>;

/// Panel error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Owner {owner_id} already has a VPS")]
    DuplicateVps { owner_id: String },

    #[error("Username '{0}' is already taken")]
    DuplicateUsername(String),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Insufficient permissions: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("VPS is not running")]
    NotRunning,

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable, client-visible classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    DuplicateVps,
    DuplicateUsername,
    NotFound,
    Forbidden,
    Unauthorized,
    NotRunning,
    InvalidAction,
    InvalidTransition,
    ValidationError,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::DuplicateVps => "DuplicateVps",
            ErrorKind::DuplicateUsername => "DuplicateUsername",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::NotRunning => "NotRunning",
            ErrorKind::InvalidAction => "InvalidAction",
            ErrorKind::InvalidTransition => "InvalidTransition",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn not_found(kind: &str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.to_string(),
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DuplicateVps { .. } => ErrorKind::DuplicateVps,
            Error::DuplicateUsername(_) => ErrorKind::DuplicateUsername,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::NotRunning => ErrorKind::NotRunning,
            Error::InvalidAction(_) => ErrorKind::InvalidAction,
            Error::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Error::Validation(_) => ErrorKind::ValidationError,
            Error::Io(_)
            | Error::Database(_)
            | Error::Serialization(_)
            | Error::PasswordHash(_)
            | Error::InvalidConfig(_)
            | Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::NotRunning.kind(), ErrorKind::NotRunning);
        assert_eq!(
            Error::Validation("name".into()).kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(Error::not_found("vps", "x").kind(), ErrorKind::NotFound);
        assert_eq!(Error::Internal("boom".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_messages() {
        assert_eq!(Error::NotRunning.to_string(), "VPS is not running");
        let err = Error::InvalidTransition {
            from: "running".into(),
            to: "running".into(),
        };
        assert_eq!(err.to_string(), "Invalid state transition: running -> running");
    }
}
