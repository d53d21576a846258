//! NetBox store errors

use ipam_core::IpamError;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the NetBox API
#[derive(Debug, Error)]
pub enum NetBoxStoreError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// NetBox API returned an unexpected status
    #[error("NetBox API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (invalid token, expired, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// NetBox rejected the request body
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// NetBox rejected the request because a unique value is already taken
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Stored data could not be mapped onto the pool model
    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl NetBoxStoreError {
    /// Classify a non-success response
    pub fn from_status(status: StatusCode, context: &str, body: &str) -> Self {
        let detail = format!("{} - {} - {}", context, status, body);
        match status {
            StatusCode::NOT_FOUND => NetBoxStoreError::NotFound(detail),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NetBoxStoreError::Authentication(detail),
            StatusCode::BAD_REQUEST if is_uniqueness_violation(body) => NetBoxStoreError::Conflict(detail),
            StatusCode::BAD_REQUEST => NetBoxStoreError::InvalidRequest(detail),
            _ => NetBoxStoreError::Api(detail),
        }
    }
}

/// NetBox reports unique-constraint failures as 400 with a field message
fn is_uniqueness_violation(body: &str) -> bool {
    let lowered = body.to_lowercase();
    lowered.contains("already exists") || lowered.contains("must be unique") || lowered.contains("duplicate")
}

impl From<NetBoxStoreError> for IpamError {
    fn from(err: NetBoxStoreError) -> Self {
        match err {
            NetBoxStoreError::NotFound(msg) => IpamError::NotFound(msg),
            NetBoxStoreError::InvalidRequest(msg) => IpamError::Validation(msg),
            NetBoxStoreError::Conflict(msg) => IpamError::conflict(msg),
            NetBoxStoreError::Cancelled => IpamError::Cancelled,
            other => IpamError::Storage(other.to_string()),
        }
    }
}
