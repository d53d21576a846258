//! Conflict detector
//!
//! Answers "would committing these planned pools collide with what is already
//! allocated". The check is advisory on its own; the schema planner turns a
//! non-empty result into a hard failure.

use crate::cidr::Prefix;
use crate::config::IpamConfig;
use crate::error::IpamError;
use crate::index::PrefixIndex;
use crate::models::{null_as_default, Pool, PoolId, SchemaEntry};
use crate::store_trait::PoolStore;
use crate::validation::{for_entry, validate_name, validate_pool_cidr};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How a planned prefix relates to an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapType {
    /// Planned fully contains existing (equal prefixes land here)
    Contains,
    /// Existing fully contains planned
    ContainedBy,
    /// Partial intersection, neither containing the other
    Overlap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub planned_cidr: Prefix,
    pub planned_name: String,
    pub existing_pool_id: PoolId,
    pub existing_pool_name: String,
    pub existing_cidr: Prefix,
    pub overlap_type: OverlapType,
}

/// A validated (name, cidr) pair proposed for creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPool {
    pub name: String,
    pub cidr: Prefix,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub pools: Vec<SchemaEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub conflicts: Vec<Conflict>,
    pub total_pools: usize,
    pub conflict_count: usize,
}

/// Classify the relationship between two prefixes, `None` if they are disjoint
pub fn classify(planned: &Prefix, existing: &Prefix) -> Option<OverlapType> {
    if planned.contains(existing) {
        Some(OverlapType::Contains)
    } else if existing.contains(planned) {
        Some(OverlapType::ContainedBy)
    } else if planned.first() <= existing.last() && existing.first() <= planned.last() {
        Some(OverlapType::Overlap)
    } else {
        None
    }
}

/// Every (planned, existing) collision, ordered by planned entry then existing pool id
pub fn detect_conflicts(planned: &[PlannedPool], existing: &[Pool]) -> Vec<Conflict> {
    let index = PrefixIndex::build(existing.iter().map(|pool| pool.cidr));
    let mut conflicts = Vec::new();

    for plan in planned {
        let mut hits: Vec<&Pool> = index
            .overlapping(&plan.cidr)
            .into_iter()
            .map(|position| &existing[position])
            .collect();
        hits.sort_by_key(|pool| pool.id);

        for pool in hits {
            if let Some(overlap_type) = classify(&plan.cidr, &pool.cidr) {
                conflicts.push(Conflict {
                    planned_cidr: plan.cidr,
                    planned_name: plan.name.clone(),
                    existing_pool_id: pool.id,
                    existing_pool_name: pool.name.clone(),
                    existing_cidr: pool.cidr,
                    overlap_type,
                });
            }
        }
    }

    conflicts
}

/// Label used in error messages: the ref when present, otherwise the position
pub(crate) fn entry_label(entry: &SchemaEntry, position: usize) -> String {
    let reference = entry.reference.trim();
    if reference.is_empty() {
        format!("pool #{}", position + 1)
    } else {
        format!("pool '{}'", reference)
    }
}

/// Validate the name and CIDR of every entry, as direct pool creation would
pub fn planned_pools(entries: &[SchemaEntry], config: &IpamConfig) -> Result<Vec<PlannedPool>, IpamError> {
    entries
        .iter()
        .enumerate()
        .map(|(position, entry)| {
            let label = entry_label(entry, position);
            let name = validate_name(&entry.name, config).map_err(|e| for_entry(&label, e))?;
            let cidr = validate_pool_cidr(&entry.cidr, config).map_err(|e| for_entry(&label, e))?;
            Ok(PlannedPool { name, cidr })
        })
        .collect()
}

/// Runs the conflict check against the current pool set
pub struct ConflictChecker<'a, S: PoolStore + ?Sized> {
    store: &'a S,
    config: &'a IpamConfig,
}

impl<'a, S: PoolStore + ?Sized> ConflictChecker<'a, S> {
    pub fn new(store: &'a S, config: &'a IpamConfig) -> Self {
        Self { store, config }
    }

    pub async fn check(&self, cancel: &CancellationToken, request: &CheckRequest) -> Result<CheckResponse, IpamError> {
        let planned = planned_pools(&request.pools, self.config)?;
        let existing = self.store.list_pools(cancel).await?;
        let conflicts = detect_conflicts(&planned, &existing);

        debug!(
            "Conflict check: {} planned pools against {} existing, {} conflicts",
            planned.len(),
            existing.len(),
            conflicts.len()
        );

        Ok(CheckResponse {
            total_pools: planned.len(),
            conflict_count: conflicts.len(),
            conflicts,
        })
    }
}
