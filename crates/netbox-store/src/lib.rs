//! NetBox pool store
//!
//! Implements the IPAM engine's `PoolStore` on top of the NetBox REST API.
//! Pools are stored as IPv4 prefixes (`/api/ipam/prefixes/`) with their
//! metadata in custom fields; accounts are read from tenants
//! (`/api/tenancy/tenants/`).
//!
//! # Example
//!
//! ```no_run
//! use ipam_core::{IpamConfig, PoolHierarchy};
//! use netbox_store::NetBoxStore;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = NetBoxStore::new("http://netbox:80", "your-api-token")?;
//! let config = IpamConfig::default();
//! let cancel = CancellationToken::new();
//!
//! let pools = PoolHierarchy::new(&store, &config).list(&cancel).await?;
//! println!("{} pools", pools.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Required custom fields
//!
//! On `ipam.prefix`: `ipam_pool_name` (text), `ipam_pool_type` (text),
//! `ipam_parent_id` (integer), `ipam_source` (text), `ipam_tags` (JSON).
//! On `tenancy.tenant`: `ipam_provider` (text), `ipam_account_cidr` (text).

pub mod convert;
pub mod error;
pub mod http;
pub mod models;
pub mod store;


pub use error::NetBoxStoreError;
pub use http::HttpClient;
pub use models::*;
pub use store::NetBoxStore;
