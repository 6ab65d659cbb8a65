//! Unified error model for role resolution and assignment management.
//! Only `NotFound` (during ancestor walks) and `Malformed` (during record merges)
//! are recovered inside the crate; every other kind is returned to the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AclError {
    /// A referenced node or property is genuinely absent.
    #[error("not_found: {what}")]
    NotFound { what: String },
    /// An assignment record with an empty principal or empty role text.
    #[error("malformed_record: {node}: {reason}")]
    Malformed { node: String, reason: String },
    #[error("{code}: {message}")]
    InvalidInput { code: String, message: String },
    /// The tree store failed for a reason unrelated to not-found.
    #[error("storage_failure: {message}")]
    Storage { message: String },
    /// Marker and container disagree in a way that is not a plain absence.
    #[error("structural_inconsistency: {node}: {message}")]
    Inconsistent { node: String, message: String },
    /// A session save raced a newer committed write.
    #[error("conflict: {message}")]
    Conflict { message: String },
}

impl AclError {
    pub fn code_str(&self) -> &str {
        match self {
            AclError::NotFound { .. } => "not_found",
            AclError::Malformed { .. } => "malformed_record",
            AclError::InvalidInput { code, .. } => code.as_str(),
            AclError::Storage { .. } => "storage_failure",
            AclError::Inconsistent { .. } => "structural_inconsistency",
            AclError::Conflict { .. } => "conflict",
        }
    }

    pub fn not_found<S: Into<String>>(what: S) -> Self { AclError::NotFound { what: what.into() } }
    pub fn malformed<N: Into<String>, R: Into<String>>(node: N, reason: R) -> Self { AclError::Malformed { node: node.into(), reason: reason.into() } }
    pub fn input<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::InvalidInput { code: code.into(), message: msg.into() } }
    pub fn storage<S: Into<String>>(msg: S) -> Self { AclError::Storage { message: msg.into() } }
    pub fn inconsistent<N: Into<String>, M: Into<String>>(node: N, msg: M) -> Self { AclError::Inconsistent { node: node.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(msg: S) -> Self { AclError::Conflict { message: msg.into() } }

    pub fn is_not_found(&self) -> bool { matches!(self, AclError::NotFound { .. }) }

    /// Structural inconsistencies are surfaced exactly like storage failures.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, AclError::Storage { .. } | AclError::Inconsistent { .. })
    }

    /// Map to the HTTP status a boundary layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            AclError::InvalidInput { .. } => 400,
            AclError::NotFound { .. } => 404,
            AclError::Conflict { .. } => 409,
            AclError::Malformed { .. } | AclError::Storage { .. } | AclError::Inconsistent { .. } => 500,
        }
    }
}

pub type AclResult<T> = Result<T, AclError>;

impl From<std::io::Error> for AclError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            AclError::NotFound { what: err.to_string() }
        } else {
            AclError::Storage { message: err.to_string() }
        }
    }
}

impl From<serde_json::Error> for AclError {
    fn from(err: serde_json::Error) -> Self {
        AclError::Storage { message: format!("json: {}", err) }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
