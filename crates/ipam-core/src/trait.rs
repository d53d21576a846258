//! Storage contract consumed by the engine
//!
//! The engine only needs to list, fetch, create and update pools and to list
//! accounts. Implementations may be in-memory, file-backed, relational or a
//! remote IPAM such as NetBox.

use crate::error::IpamError;
use crate::models::*;
use tokio_util::sync::CancellationToken;

/// Trait for pool persistence
///
/// Every call receives the caller's cancellation token unchanged and must
/// return [`IpamError::Cancelled`] once it fires. `list_pools` must reflect a
/// consistent point-in-time view so conflict detection does not miss pools
/// committed by concurrent writers. Retries, if any, live here and not in the
/// engine.
#[async_trait::async_trait]
pub trait PoolStore: Send + Sync {
    /// All pools, in ascending id order
    async fn list_pools(&self, cancel: &CancellationToken) -> Result<Vec<Pool>, IpamError>;

    async fn get_pool(&self, cancel: &CancellationToken, id: PoolId) -> Result<Option<Pool>, IpamError>;

    /// Fails with a conflict-kind error on a uniqueness violation, validation-kind on
    /// malformed input, and not-found-kind when `parent_id` does not exist
    async fn create_pool(&self, cancel: &CancellationToken, pool: NewPool) -> Result<Pool, IpamError>;

    async fn update_pool(&self, cancel: &CancellationToken, id: PoolId, update: PoolUpdate) -> Result<Pool, IpamError>;

    async fn list_accounts(&self, cancel: &CancellationToken) -> Result<Vec<Account>, IpamError>;
}
