//! IPAM engine errors

use crate::conflict::Conflict;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while planning or validating address space
#[derive(Debug, Error)]
pub enum IpamError {
    /// Malformed CIDR, name, type or status, duplicate ref, out-of-order parent_ref
    #[error("Validation error: {0}")]
    Validation(String),

    /// Child CIDR is not inside its declared parent
    #[error("Containment error: {0}")]
    Containment(String),

    /// Address-range collision with an existing, unrelated pool
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        conflicts: Vec<Conflict>,
    },

    /// Referenced parent, pool or account is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,
}

/// Coarse error classification used by callers to pick user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Containment,
    Conflict,
    NotFound,
    Storage,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Containment => "containment",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Storage => "storage",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl IpamError {
    /// Conflict error without an attached conflict list (e.g. a duplicate name in storage)
    pub fn conflict(message: impl Into<String>) -> Self {
        IpamError::Conflict {
            message: message.into(),
            conflicts: Vec::new(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IpamError::Validation(_) => ErrorKind::Validation,
            IpamError::Containment(_) => ErrorKind::Containment,
            IpamError::Conflict { .. } => ErrorKind::Conflict,
            IpamError::NotFound(_) => ErrorKind::NotFound,
            IpamError::Storage(_) => ErrorKind::Storage,
            IpamError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Address conflicts attached to this error, if any
    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            IpamError::Conflict { conflicts, .. } => conflicts,
            _ => &[],
        }
    }
}
