//! Pool hierarchy model
//!
//! The entity and invariant layer over the storage contract. The tree is
//! declared through `parent_id`; address containment only validates a declared
//! relationship and is never used to discover one.
//!
//! Invariant: two pools may overlap only if one is an ancestor of the other in
//! the declared `parent_id` chain.

use crate::cidr::{self, Prefix, SubnetWindow};
use crate::config::IpamConfig;
use crate::conflict::{classify, Conflict, OverlapType};
use crate::error::IpamError;
use crate::index::PrefixIndex;
use crate::models::*;
use crate::store_trait::PoolStore;
use crate::validation::{validate_name, validate_pool_cidr};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fails unless `child` lies entirely inside `parent`
pub fn validate_child_cidr(parent: &Prefix, child: &Prefix) -> Result<(), IpamError> {
    if cidr::contains(parent, child) {
        Ok(())
    } else {
        Err(IpamError::Containment(format!(
            "CIDR {} is not contained in parent CIDR {}",
            child, parent
        )))
    }
}

/// Pool creation request as received from a caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolSpec {
    pub name: String,
    pub cidr: String,
    /// Defaults to `subnet`
    #[serde(rename = "type", default)]
    pub pool_type: Option<String>,
    /// Defaults to `planned`
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub parent_id: Option<PoolId>,
    /// Defaults to `manual`
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Tags,
}

/// Pool update request as received from a caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolPatch {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Tags>,
}

/// Whether `create_validated` re-checks the overlap invariant against storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapPolicy {
    Enforce,
    /// The caller already gated on conflicts (or explicitly chose not to)
    Skip,
}

/// Two stored pools that overlap without an ancestor relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantViolation {
    pub pool_id: PoolId,
    pub pool_name: String,
    pub pool_cidr: Prefix,
    pub other_pool_id: PoolId,
    pub other_pool_name: String,
    pub other_cidr: Prefix,
    pub overlap_type: OverlapType,
}

/// Ids on the declared chain starting at `start` (inclusive) and walking up
///
/// Dangling parents end the walk; a visited set guards against cycles.
pub fn ancestor_ids(pools: &HashMap<PoolId, &Pool>, start: Option<PoolId>) -> HashSet<PoolId> {
    let mut chain = HashSet::new();
    let mut current = start;
    while let Some(id) = current {
        if !chain.insert(id) {
            debug!("Cycle in pool parent chain at pool {}", id);
            break;
        }
        current = pools.get(&id).and_then(|pool| pool.parent_id);
    }
    chain
}

/// Existing pools that would overlap `candidate` without being one of its ancestors
pub fn unrelated_overlaps(pools: &[Pool], candidate: &NewPool) -> Vec<Conflict> {
    let by_id: HashMap<PoolId, &Pool> = pools.iter().map(|pool| (pool.id, pool)).collect();
    let allowed = ancestor_ids(&by_id, candidate.parent_id);
    let index = PrefixIndex::build(pools.iter().map(|pool| pool.cidr));

    let mut hits: Vec<&Pool> = index
        .overlapping(&candidate.cidr)
        .into_iter()
        .map(|position| &pools[position])
        .filter(|pool| !allowed.contains(&pool.id))
        .collect();
    hits.sort_by_key(|pool| pool.id);

    hits.into_iter()
        .filter_map(|pool| {
            classify(&candidate.cidr, &pool.cidr).map(|overlap_type| Conflict {
                planned_cidr: candidate.cidr,
                planned_name: candidate.name.clone(),
                existing_pool_id: pool.id,
                existing_pool_name: pool.name.clone(),
                existing_cidr: pool.cidr,
                overlap_type,
            })
        })
        .collect()
}

/// Every pair of stored pools violating the overlap invariant
pub fn audit_overlaps(pools: &[Pool]) -> Vec<InvariantViolation> {
    let by_id: HashMap<PoolId, &Pool> = pools.iter().map(|pool| (pool.id, pool)).collect();
    let chains: Vec<HashSet<PoolId>> = pools
        .iter()
        .map(|pool| ancestor_ids(&by_id, Some(pool.id)))
        .collect();
    let index = PrefixIndex::build(pools.iter().map(|pool| pool.cidr));

    let mut violations = Vec::new();
    for (i, pool) in pools.iter().enumerate() {
        for j in index.overlapping(&pool.cidr).into_iter().filter(|j| *j > i) {
            let other = &pools[j];
            let related = chains[i].contains(&other.id) || chains[j].contains(&pool.id);
            if related {
                continue;
            }
            if let Some(overlap_type) = classify(&pool.cidr, &other.cidr) {
                violations.push(InvariantViolation {
                    pool_id: pool.id,
                    pool_name: pool.name.clone(),
                    pool_cidr: pool.cidr,
                    other_pool_id: other.id,
                    other_pool_name: other.name.clone(),
                    other_cidr: other.cidr,
                    overlap_type,
                });
            }
        }
    }
    violations
}

/// Pool operations with hierarchy validation on top of a `PoolStore`
pub struct PoolHierarchy<'a, S: PoolStore + ?Sized> {
    store: &'a S,
    config: &'a IpamConfig,
}

impl<'a, S: PoolStore + ?Sized> PoolHierarchy<'a, S> {
    pub fn new(store: &'a S, config: &'a IpamConfig) -> Self {
        Self { store, config }
    }

    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Pool>, IpamError> {
        self.store.list_pools(cancel).await
    }

    pub async fn get(&self, cancel: &CancellationToken, id: PoolId) -> Result<Pool, IpamError> {
        self.store
            .get_pool(cancel, id)
            .await?
            .ok_or_else(|| IpamError::NotFound(format!("Pool {} not found", id)))
    }

    /// Validate a raw request into storage input; performs no I/O
    pub fn validate_spec(&self, spec: &PoolSpec) -> Result<NewPool, IpamError> {
        let name = validate_name(&spec.name, self.config)?;
        let cidr = validate_pool_cidr(&spec.cidr, self.config)?;
        let pool_type = match non_blank(spec.pool_type.as_deref()) {
            Some(raw) => raw.parse::<PoolType>()?,
            None => PoolType::Subnet,
        };
        let status = match non_blank(spec.status.as_deref()) {
            Some(raw) => raw.parse::<PoolStatus>()?,
            None => PoolStatus::default(),
        };
        let source = match non_blank(spec.source.as_deref()) {
            Some(raw) => raw.parse::<PoolSource>()?,
            None => PoolSource::default(),
        };

        Ok(NewPool {
            name,
            cidr,
            pool_type,
            status,
            parent_id: spec.parent_id,
            source,
            description: spec.description.clone().unwrap_or_default(),
            tags: spec.tags.clone(),
        })
    }

    pub async fn create(&self, cancel: &CancellationToken, spec: &PoolSpec) -> Result<Pool, IpamError> {
        let new_pool = self.validate_spec(spec)?;
        self.create_validated(cancel, new_pool, OverlapPolicy::Enforce).await
    }

    /// Create an already-validated pool
    ///
    /// The declared parent must exist and contain the pool. With
    /// `OverlapPolicy::Enforce` the current pool set is also checked for
    /// overlaps outside the declared ancestor chain.
    pub async fn create_validated(
        &self,
        cancel: &CancellationToken,
        new_pool: NewPool,
        policy: OverlapPolicy,
    ) -> Result<Pool, IpamError> {
        if let Some(parent_id) = new_pool.parent_id {
            let parent = self
                .store
                .get_pool(cancel, parent_id)
                .await?
                .ok_or_else(|| IpamError::NotFound(format!("Parent pool {} not found", parent_id)))?;
            validate_child_cidr(&parent.cidr, &new_pool.cidr)?;
        }

        if policy == OverlapPolicy::Enforce {
            let pools = self.store.list_pools(cancel).await?;
            let conflicts = unrelated_overlaps(&pools, &new_pool);
            if !conflicts.is_empty() {
                return Err(IpamError::Conflict {
                    message: format!(
                        "{} overlaps {} existing pool(s) outside its parent chain",
                        new_pool.cidr,
                        conflicts.len()
                    ),
                    conflicts,
                });
            }
        }

        let pool = self.store.create_pool(cancel, new_pool).await?;
        debug!("Created pool {} '{}' ({}) parent={:?}", pool.id, pool.name, pool.cidr, pool.parent_id);
        Ok(pool)
    }

    /// Change status, description or tags; nothing else is mutable
    pub async fn update(&self, cancel: &CancellationToken, id: PoolId, patch: &PoolPatch) -> Result<Pool, IpamError> {
        let update = PoolUpdate {
            status: non_blank(patch.status.as_deref()).map(str::parse::<PoolStatus>).transpose()?,
            description: patch.description.clone(),
            tags: patch.tags.clone(),
        };

        if update.is_empty() {
            return self.get(cancel, id).await;
        }
        self.store.update_pool(cancel, id, update).await
    }

    /// Declared ancestors of a pool, nearest first
    pub async fn ancestors(&self, cancel: &CancellationToken, id: PoolId) -> Result<Vec<Pool>, IpamError> {
        let pool = self.get(cancel, id).await?;
        let mut visited = HashSet::from([pool.id]);
        let mut chain = Vec::new();
        let mut next = pool.parent_id;

        while let Some(parent_id) = next {
            if !visited.insert(parent_id) {
                debug!("Cycle in pool parent chain at pool {}", parent_id);
                break;
            }
            match self.store.get_pool(cancel, parent_id).await? {
                Some(parent) => {
                    next = parent.parent_id;
                    chain.push(parent);
                }
                None => {
                    debug!("Pool {} has dangling parent {}", id, parent_id);
                    break;
                }
            }
        }
        Ok(chain)
    }

    /// Windowed child blocks of a stored pool
    pub async fn subnets(
        &self,
        cancel: &CancellationToken,
        id: PoolId,
        child_len: u8,
        offset: u64,
        limit: u64,
    ) -> Result<SubnetWindow, IpamError> {
        let pool = self.get(cancel, id).await?;
        cidr::windowed_subnets(&pool.cidr, child_len, offset, limit)
    }

    /// Scan the whole pool set for invariant violations
    pub async fn audit(&self, cancel: &CancellationToken) -> Result<Vec<InvariantViolation>, IpamError> {
        let pools = self.store.list_pools(cancel).await?;
        Ok(audit_overlaps(&pools))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
