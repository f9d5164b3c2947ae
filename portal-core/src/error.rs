//! src/error.rs
//! ============================================================================
//! # `PortalError`: Unified Error Type for the Portal Core
//!
//! Every fallible operation in the crate returns `Result<T, PortalError>`.
//! Variants carry enough context to decide, at the call boundary, whether the
//! failure becomes local state (a record's error map), a user notification, or
//! the fatal session-expiry path.

use std::{io, path::PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

use crate::http::HttpError;

/// Field-keyed validation messages returned by the backend on a 400.
pub type FieldErrors = IndexMap<String, String>;

/// Crate-wide result alias.
pub type PortalResult<T> = Result<T, PortalError>;

/// Failure taxonomy used when deciding how to surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Recovered locally by writing into the record's `errors` map.
    Validation,

    /// Global notification plus navigation to the forbidden route.
    Authorization,

    /// Global notification, no automatic recovery.
    Transient,

    /// Fatal: clear the session and go back to login.
    SessionExpired,

    /// Everything that is not a remote failure (local bugs, I/O, config).
    Local,
}

/// Unified error type for all portal operations.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Raw HTTP failure reported by a remote collaborator.
    #[error("HTTP {}: {}", .0.status, .0.status_text())]
    Http(HttpError),

    /// 400 with a field-keyed error body.
    #[error("Validation failed on {} field(s)", .fields.len())]
    Validation {
        fields: FieldErrors,
        general: Vec<String>,
    },

    /// 401 from the authentication endpoint.
    #[error("Unauthorized")]
    Unauthorized,

    /// 403 from any endpoint.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 5xx / gateway failures.
    #[error("Service unavailable ({status}): {reason}")]
    Transient { status: u16, reason: String },

    /// Refresh token rejected or retries exhausted.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Input validation errors raised locally.
    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    /// Persisted session storage failure.
    #[error("Session storage error at {path:?}: {reason}")]
    Storage { path: PathBuf, reason: String },

    /// Standard IO error, auto-converted from `io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization error (e.g., JSON).
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// TOML config parsing error.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Operation cancelled because its owning scope was torn down.
    #[error("Operation was cancelled")]
    Cancelled,

    /// Any other error, with description.
    #[error("Unexpected error: {0}")]
    Other(String),
}

impl PortalError {
    /// Create an input validation error
    pub fn invalid_input<S1: Into<String>, S2: Into<String>>(field: S1, message: S2) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a session storage error
    pub fn storage<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::Storage {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a session expiry error
    pub fn session_expired<S: Into<String>>(reason: S) -> Self {
        Self::SessionExpired(reason.into())
    }

    /// HTTP status carried by this error, if it came from a remote call.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http(err) => Some(err.status),
            Self::Validation { .. } => Some(400),
            Self::Unauthorized => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::Transient { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Map the error onto the failure taxonomy.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation { .. } => ErrorClass::Validation,
            Self::Forbidden(_) => ErrorClass::Authorization,
            Self::Unauthorized | Self::SessionExpired(_) => ErrorClass::SessionExpired,
            Self::Transient { .. } => ErrorClass::Transient,
            Self::Http(err) => match err.status {
                400 => ErrorClass::Validation,
                401 => ErrorClass::SessionExpired,
                403 => ErrorClass::Authorization,
                _ => ErrorClass::Transient,
            },
            _ => ErrorClass::Local,
        }
    }

    /// Field-keyed messages carried by a validation failure.
    #[must_use]
    pub fn field_errors(&self) -> Option<FieldErrors> {
        match self {
            Self::Validation { fields, .. } => Some(fields.clone()),
            Self::Http(err) if err.status == 400 => Some(err.field_errors()),
            _ => None,
        }
    }

    /// Joined `generalErrors` description, empty when absent.
    #[must_use]
    pub fn general_error(&self) -> String {
        match self {
            Self::Http(err) => err.general_errors().join(", "),
            Self::Validation { general, .. } => general.join(", "),
            _ => String::new(),
        }
    }
}

impl From<HttpError> for PortalError {
    fn from(err: HttpError) -> Self {
        match err.status {
            400 => {
                let fields = err.field_errors();
                if fields.is_empty() {
                    Self::Http(err)
                } else {
                    Self::Validation {
                        general: err.general_errors(),
                        fields,
                    }
                }
            }
            401 => Self::Unauthorized,
            403 => Self::Forbidden(err.status_text().to_string()),
            500..=599 => Self::Transient {
                status: err.status,
                reason: err.status_text().to_string(),
            },
            _ => Self::Http(err),
        }
    }
}

// Manual Clone implementation to handle non-Clone fields
impl Clone for PortalError {
    fn clone(&self) -> Self {
        match self {
            Self::Http(err) => Self::Http(err.clone()),
            Self::Validation { fields, general } => Self::Validation {
                fields: fields.clone(),
                general: general.clone(),
            },
            Self::Unauthorized => Self::Unauthorized,
            Self::Forbidden(msg) => Self::Forbidden(msg.clone()),
            Self::Transient { status, reason } => Self::Transient {
                status: *status,
                reason: reason.clone(),
            },
            Self::SessionExpired(msg) => Self::SessionExpired(msg.clone()),
            Self::InvalidInput { field, message } => Self::InvalidInput {
                field: field.clone(),
                message: message.clone(),
            },
            Self::Storage { path, reason } => Self::Storage {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::Io(e) => Self::Io(io::Error::new(e.kind(), e.to_string())),
            Self::Serde(e) => Self::Other(format!("Serde error: {e}")),
            Self::Config(e) => Self::Other(format!("Config error: {e}")),
            Self::Cancelled => Self::Cancelled,
            Self::Other(msg) => Self::Other(msg.clone()),
        }
    }
}

// Allow conversion from `anyhow::Error` as fallback.
impl From<anyhow::Error> for PortalError {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(e.to_string())
    }
}
