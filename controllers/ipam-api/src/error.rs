//! API error types
//!
//! `ApiError` turns engine errors into JSON responses; `ServiceError` covers
//! startup failures in `main`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ipam_core::{Conflict, ErrorKind, IpamError};
use netbox_store::NetBoxStoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Errors that can stop the service from starting
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// NetBox store could not be created or reached
    #[error("NetBox error: {0}")]
    NetBox(#[from] NetBoxStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IpamError> for ServiceError {
    fn from(err: IpamError) -> Self {
        ServiceError::InvalidConfig(err.to_string())
    }
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Conflict>,
}

/// A handler error; wraps the engine error
#[derive(Debug)]
pub struct ApiError(pub IpamError);

impl From<IpamError> for ApiError {
    fn from(err: IpamError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(IpamError::Validation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Validation | ErrorKind::Containment => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Storage => StatusCode::BAD_GATEWAY,
            ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
            conflicts: self.0.conflicts().to_vec(),
        };
        (status, Json(body)).into_response()
    }
}
