//! `PoolStore` backed by NetBox prefixes and tenants

use crate::convert::{account_from_tenant, pool_from_prefix, prefix_body, update_body, CF_POOL_NAME};
use crate::error::NetBoxStoreError;
use crate::http::HttpClient;
use crate::models::{NetBoxPrefix, NetBoxTenant};
use ipam_core::{Account, IpamError, NewPool, Pool, PoolId, PoolStore, PoolUpdate};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const PREFIXES_PATH: &str = "/api/ipam/prefixes/";
const TENANTS_PATH: &str = "/api/tenancy/tenants/";
const PAGE_LIMIT: &str = "1000";

/// NetBox pool store
#[derive(Debug, Clone)]
pub struct NetBoxStore {
    http: HttpClient,
}

impl NetBoxStore {
    /// Create a new NetBox store
    ///
    /// # Arguments
    /// * `base_url` - NetBox base URL (e.g., "http://netbox:80")
    /// * `token` - API token for authentication
    pub fn new(base_url: &str, token: &str) -> Result<Self, NetBoxStoreError> {
        Self::with_timeout(base_url, token, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, token: &str, timeout: Duration) -> Result<Self, NetBoxStoreError> {
        Ok(Self {
            http: HttpClient::new(base_url, token, timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Verify connectivity and token validity
    pub async fn validate_token(&self, cancel: &CancellationToken) -> Result<(), NetBoxStoreError> {
        debug!("Validating NetBox token and connectivity");
        self.http.check_status(cancel).await
    }

    async fn fetch_prefixes(
        &self,
        cancel: &CancellationToken,
        filters: &[(&str, &str)],
    ) -> Result<Vec<NetBoxPrefix>, NetBoxStoreError> {
        let mut query = vec![("family", "4"), ("limit", PAGE_LIMIT)];
        query.extend_from_slice(filters);
        let path = format!("{}?{}", PREFIXES_PATH, HttpClient::build_query_string(&query));
        self.http.fetch_all_pages(cancel, &path).await
    }

    async fn find_pool_by_name(&self, cancel: &CancellationToken, name: &str) -> Result<Option<Pool>, IpamError> {
        let filter = format!("cf_{}__ie", CF_POOL_NAME);
        let prefixes = self.fetch_prefixes(cancel, &[(filter.as_str(), name)]).await?;
        for prefix in &prefixes {
            if let Some(pool) = pool_from_prefix(prefix)? {
                if pool.name.eq_ignore_ascii_case(name) {
                    return Ok(Some(pool));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait::async_trait]
impl PoolStore for NetBoxStore {
    async fn list_pools(&self, cancel: &CancellationToken) -> Result<Vec<Pool>, IpamError> {
        let prefixes = self.fetch_prefixes(cancel, &[]).await?;
        let mut pools = Vec::with_capacity(prefixes.len());
        for prefix in &prefixes {
            match pool_from_prefix(prefix)? {
                Some(pool) => pools.push(pool),
                None => debug!("Skipping non-IPv4 prefix {} ({})", prefix.id, prefix.prefix),
            }
        }
        pools.sort_by_key(|pool| pool.id);
        Ok(pools)
    }

    async fn get_pool(&self, cancel: &CancellationToken, id: PoolId) -> Result<Option<Pool>, IpamError> {
        let path = format!("{}{}/", PREFIXES_PATH, id);
        match self.http.get_optional::<NetBoxPrefix>(cancel, &path).await? {
            Some(prefix) => Ok(pool_from_prefix(&prefix)?),
            None => Ok(None),
        }
    }

    async fn create_pool(&self, cancel: &CancellationToken, pool: NewPool) -> Result<Pool, IpamError> {
        if let Some(parent_id) = pool.parent_id {
            if self.get_pool(cancel, parent_id).await?.is_none() {
                return Err(IpamError::NotFound(format!("Parent pool {} not found", parent_id)));
            }
        }
        if let Some(existing) = self.find_pool_by_name(cancel, &pool.name).await? {
            return Err(IpamError::conflict(format!(
                "pool name '{}' is already used by pool {}",
                pool.name, existing.id
            )));
        }

        let created: NetBoxPrefix = self.http.post(cancel, PREFIXES_PATH, &prefix_body(&pool)).await?;
        debug!("Created NetBox prefix {} for pool '{}'", created.id, pool.name);
        pool_from_prefix(&created)?.ok_or_else(|| {
            IpamError::Storage(format!("NetBox returned non-IPv4 prefix {} for pool '{}'", created.prefix, pool.name))
        })
    }

    async fn update_pool(&self, cancel: &CancellationToken, id: PoolId, update: PoolUpdate) -> Result<Pool, IpamError> {
        let path = format!("{}{}/", PREFIXES_PATH, id);
        let updated: NetBoxPrefix = self
            .http
            .patch(cancel, &path, &update_body(&update))
            .await
            .map_err(|e| match e {
                NetBoxStoreError::NotFound(_) => IpamError::NotFound(format!("Pool {} not found", id)),
                other => other.into(),
            })?;
        pool_from_prefix(&updated)?.ok_or_else(|| IpamError::NotFound(format!("Pool {} not found", id)))
    }

    async fn list_accounts(&self, cancel: &CancellationToken) -> Result<Vec<Account>, IpamError> {
        let path = format!("{}?limit={}", TENANTS_PATH, PAGE_LIMIT);
        let tenants: Vec<NetBoxTenant> = self.http.fetch_all_pages(cancel, &path).await?;
        let mut accounts: Vec<Account> = tenants.iter().map(account_from_tenant).collect();
        accounts.sort_by_key(|account| account.id);
        if accounts.iter().any(|a| a.provider.is_empty()) {
            warn!("Some NetBox tenants have no ipam_provider custom field set");
        }
        Ok(accounts)
    }
}
