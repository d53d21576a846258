//! IPAM API service
//!
//! JSON over HTTP front end for the IPAM engine: pool CRUD, windowed subnet
//! listing, schema conflict checks and bulk apply, and CIDR-aware search.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

pub use config::{ServiceConfig, StoreConfig};
pub use error::{ApiError, ServiceError};
pub use routes::{create_router, AppState};
