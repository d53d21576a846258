//! IPAM allocation engine
//!
//! Tracks hierarchical ownership of IPv4 address ranges ("pools"), detects
//! double-allocation before it happens and bulk-plans address space from a
//! template.
//!
//! # Example
//!
//! ```no_run
//! use ipam_core::{ApplyRequest, IpamConfig, MemoryStore, SchemaEntry, SchemaPlanner};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), ipam_core::IpamError> {
//! let store = MemoryStore::new();
//! let config = IpamConfig::default();
//! let cancel = CancellationToken::new();
//!
//! let request = ApplyRequest {
//!     pools: vec![
//!         SchemaEntry::new("root", "corp", "10.0.0.0/8").with_type("supernet"),
//!         SchemaEntry::new("eu", "eu-west", "10.1.0.0/16").with_type("region").with_parent("root"),
//!     ],
//!     ..ApplyRequest::default()
//! };
//! let report = SchemaPlanner::new(&store, &config).apply(&cancel, &request).await?;
//! assert_eq!(report.created, 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - **CIDR kernel** (`cidr`): containment, overlap, parsing, windowed subnet enumeration
//! - **Hierarchy model** (`hierarchy`): pool validation and the overlap invariant
//! - **Conflict detector** (`conflict`): collisions between planned and existing pools
//! - **Schema planner** (`schema`): validated bulk creation of a pool tree
//! - **Search** (`search`): text and CIDR queries over pools and accounts
//!
//! The engine emits `tracing` events but never installs a subscriber.

pub mod cidr;
pub mod config;
pub mod conflict;
pub mod error;
pub mod hierarchy;
pub mod index;
pub mod memory;
pub mod models;
pub mod schema;
pub mod search;
#[path = "trait.rs"]
pub mod store_trait;
pub mod validation;

#[cfg(test)]
mod schema_test;
#[cfg(test)]
mod test_utils;

pub use cidr::{Prefix, SubnetWindow};
pub use config::IpamConfig;
pub use conflict::{CheckRequest, CheckResponse, Conflict, ConflictChecker, OverlapType};
pub use error::{ErrorKind, IpamError};
pub use hierarchy::{InvariantViolation, PoolHierarchy, PoolPatch, PoolSpec};
pub use index::PrefixIndex;
pub use memory::MemoryStore;
pub use models::*;
pub use schema::{ApplyReport, ApplyRequest, SchemaPlanner};
pub use search::{EntityType, SearchItem, SearchParams, SearchQuery, SearchResponse, Searcher};
pub use store_trait::PoolStore;
