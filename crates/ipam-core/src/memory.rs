//! In-memory pool store
//!
//! A `PoolStore` backed by process memory. Used by tests and by single-node
//! deployments that do not need persistence across restarts.

use crate::error::IpamError;
use crate::models::*;
use crate::store_trait::PoolStore;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// In-memory store
///
/// Clones share the same underlying maps. Pool names are unique
/// (case-insensitive) and a declared parent must exist.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    pools: Arc<Mutex<BTreeMap<PoolId, Pool>>>,
    accounts: Arc<Mutex<BTreeMap<AccountId, Account>>>,
    // Pool id counter; accounts keep the ids they were added with
    next_pool_id: Arc<Mutex<PoolId>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Every critical section leaves the maps consistent, so a poisoned lock is still usable
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), IpamError> {
    if cancel.is_cancelled() {
        Err(IpamError::Cancelled)
    } else {
        Ok(())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            pools: Arc::new(Mutex::new(BTreeMap::new())),
            accounts: Arc::new(Mutex::new(BTreeMap::new())),
            next_pool_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Store pre-populated with `pools`
    pub fn with_pools(pools: impl IntoIterator<Item = Pool>) -> Self {
        let store = Self::new();
        for pool in pools {
            store.add_pool(pool);
        }
        store
    }

    /// Add a pool as-is (for test setup and imports); the pool id counter skips past it
    pub fn add_pool(&self, pool: Pool) {
        self.bump_pool_id_past(pool.id);
        lock(&self.pools).insert(pool.id, pool);
    }

    /// Add an account (for test setup and imports)
    pub fn add_account(&self, account: Account) {
        lock(&self.accounts).insert(account.id, account);
    }

    pub fn pool_count(&self) -> usize {
        lock(&self.pools).len()
    }

    fn bump_pool_id_past(&self, id: PoolId) {
        let mut next = lock(&self.next_pool_id);
        if *next <= id {
            *next = id + 1;
        }
    }

    /// Generate next pool ID
    fn next_pool_id(&self) -> PoolId {
        let mut id = lock(&self.next_pool_id);
        let current = *id;
        *id += 1;
        current
    }
}

#[async_trait::async_trait]
impl PoolStore for MemoryStore {
    async fn list_pools(&self, cancel: &CancellationToken) -> Result<Vec<Pool>, IpamError> {
        ensure_live(cancel)?;
        Ok(lock(&self.pools).values().cloned().collect())
    }

    async fn get_pool(&self, cancel: &CancellationToken, id: PoolId) -> Result<Option<Pool>, IpamError> {
        ensure_live(cancel)?;
        Ok(lock(&self.pools).get(&id).cloned())
    }

    async fn create_pool(&self, cancel: &CancellationToken, pool: NewPool) -> Result<Pool, IpamError> {
        ensure_live(cancel)?;

        // Hold the lock across check-and-insert so concurrent creates cannot both pass
        let mut pools = lock(&self.pools);

        if let Some(parent_id) = pool.parent_id {
            if !pools.contains_key(&parent_id) {
                return Err(IpamError::NotFound(format!("Parent pool {} not found", parent_id)));
            }
        }

        let lowered = pool.name.to_lowercase();
        if let Some(existing) = pools.values().find(|p| p.name.to_lowercase() == lowered) {
            return Err(IpamError::conflict(format!(
                "pool name '{}' is already used by pool {}",
                pool.name, existing.id
            )));
        }

        let id = self.next_pool_id();
        let now = Utc::now();
        let created = Pool {
            id,
            name: pool.name,
            cidr: pool.cidr,
            pool_type: pool.pool_type,
            status: pool.status,
            parent_id: pool.parent_id,
            source: pool.source,
            description: pool.description,
            tags: pool.tags,
            created_at: now,
            updated_at: now,
        };

        debug!("Stored pool {} ({}) as id {}", created.name, created.cidr, id);
        pools.insert(id, created.clone());
        Ok(created)
    }

    async fn update_pool(&self, cancel: &CancellationToken, id: PoolId, update: PoolUpdate) -> Result<Pool, IpamError> {
        ensure_live(cancel)?;

        let mut pools = lock(&self.pools);
        let pool = pools
            .get_mut(&id)
            .ok_or_else(|| IpamError::NotFound(format!("Pool {} not found", id)))?;

        update.apply_to(pool);
        pool.updated_at = Utc::now();
        Ok(pool.clone())
    }

    async fn list_accounts(&self, cancel: &CancellationToken) -> Result<Vec<Account>, IpamError> {
        ensure_live(cancel)?;
        Ok(lock(&self.accounts).values().cloned().collect())
    }
}
