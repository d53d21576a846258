//! Schema planner
//!
//! Bulk-creates a pool tree from a flat, topologically ordered list of
//! entries. Each request runs `Validate -> ConflictCheck -> SequentialCreate
//! -> Report`.
//!
//! Validate and ConflictCheck are all-or-nothing and run before any mutation.
//! SequentialCreate is not transactional. A failed entry is recorded and the
//! batch continues, so the returned `pool_map` and `errors` describe exactly
//! what was created.

use crate::cidr::Prefix;
use crate::config::IpamConfig;
use crate::conflict::{detect_conflicts, entry_label, PlannedPool};
use crate::error::IpamError;
use crate::hierarchy::{validate_child_cidr, OverlapPolicy, PoolHierarchy};
use crate::index::PrefixIndex;
use crate::models::*;
use crate::store_trait::PoolStore;
use crate::validation::{for_entry, validate_name, validate_pool_cidr};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub pools: Vec<SchemaEntry>,
    /// Status for every created pool; defaults to `planned`
    #[serde(default)]
    pub status: Option<String>,
    /// Tags merged into every created pool (entry tags win on collision)
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Tags,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skip_conflicts: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub created: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Id of the last processed entry without a parent_ref
    pub root_pool_id: Option<PoolId>,
    /// ref -> created pool id
    pub pool_map: BTreeMap<String, PoolId>,
}

/// An entry that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedEntry<'r> {
    pub entry: &'r SchemaEntry,
    pub reference: &'r str,
    pub name: String,
    pub cidr: Prefix,
    pub parent_ref: Option<&'r str>,
    // Position of the parent entry in the request
    parent_position: Option<usize>,
}

pub struct SchemaPlanner<'a, S: PoolStore + ?Sized> {
    store: &'a S,
    config: &'a IpamConfig,
}

impl<'a, S: PoolStore + ?Sized> SchemaPlanner<'a, S> {
    pub fn new(store: &'a S, config: &'a IpamConfig) -> Self {
        Self { store, config }
    }

    /// All-or-nothing validation; performs no I/O
    ///
    /// Every `parent_ref` must name an entry that appears earlier in the list.
    /// The planner relies on that order and does not sort topologically.
    pub fn validate<'r>(&self, request: &'r ApplyRequest) -> Result<Vec<ValidatedEntry<'r>>, IpamError> {
        if request.pools.is_empty() {
            return Err(IpamError::Validation("schema must contain at least one pool".to_string()));
        }
        if let Some(status) = request.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            status.parse::<PoolStatus>()?;
        }

        let mut positions: HashMap<&'r str, usize> = HashMap::new();
        let mut validated: Vec<ValidatedEntry<'r>> = Vec::with_capacity(request.pools.len());

        for (position, entry) in request.pools.iter().enumerate() {
            let label = entry_label(entry, position);
            let reference = entry.reference.trim();
            if reference.is_empty() {
                return Err(IpamError::Validation(format!("{}: ref must not be empty", label)));
            }
            if positions.contains_key(reference) {
                return Err(IpamError::Validation(format!("duplicate ref '{}'", reference)));
            }

            let name = validate_name(&entry.name, self.config).map_err(|e| for_entry(&label, e))?;
            let cidr = validate_pool_cidr(&entry.cidr, self.config).map_err(|e| for_entry(&label, e))?;

            let parent_ref = entry.parent();
            let parent_position = match parent_ref {
                None => None,
                Some(parent) => {
                    let parent_position = *positions.get(parent).ok_or_else(|| {
                        IpamError::Validation(format!(
                            "{}: parent_ref '{}' must name an earlier entry",
                            label, parent
                        ))
                    })?;
                    validate_child_cidr(&validated[parent_position].cidr, &cidr)
                        .map_err(|e| for_entry(&label, e))?;
                    Some(parent_position)
                }
            };

            positions.insert(reference, position);
            validated.push(ValidatedEntry {
                entry,
                reference,
                name,
                cidr,
                parent_ref,
                parent_position,
            });
        }

        check_internal_overlaps(&validated)?;
        Ok(validated)
    }

    pub async fn apply(&self, cancel: &CancellationToken, request: &ApplyRequest) -> Result<ApplyReport, IpamError> {
        let validated = self.validate(request)?;

        if request.skip_conflicts {
            debug!("Schema apply: conflict check skipped by caller");
        } else {
            let planned: Vec<PlannedPool> = validated
                .iter()
                .map(|v| PlannedPool {
                    name: v.name.clone(),
                    cidr: v.cidr,
                })
                .collect();
            let existing = self.store.list_pools(cancel).await?;
            let conflicts = detect_conflicts(&planned, &existing);
            if !conflicts.is_empty() {
                return Err(IpamError::Conflict {
                    message: format!(
                        "schema conflicts with existing pools ({} conflicts), nothing was created",
                        conflicts.len()
                    ),
                    conflicts,
                });
            }
        }

        let report = self.create_all(cancel, request, &validated).await;
        debug!(
            "Schema apply finished: created={} skipped={} errors={}",
            report.created,
            report.skipped,
            report.errors.len()
        );
        Ok(report)
    }

    async fn create_all(
        &self,
        cancel: &CancellationToken,
        request: &ApplyRequest,
        validated: &[ValidatedEntry<'_>],
    ) -> ApplyReport {
        let hierarchy = PoolHierarchy::new(self.store, self.config);
        let status = request
            .status
            .as_deref()
            .and_then(|s| s.parse::<PoolStatus>().ok())
            .unwrap_or_default();

        let mut report = ApplyReport::default();

        for (position, v) in validated.iter().enumerate() {
            let pool_type = self.resolve_type(v, &mut report.warnings);

            let parent_id = match v.parent_ref {
                None => None,
                Some(parent) => match report.pool_map.get(parent) {
                    Some(id) => Some(*id),
                    None => {
                        // Parent failed earlier in this batch
                        report.errors.push(format!(
                            "pool '{}': parent_ref '{}' was not created, skipping",
                            v.reference, parent
                        ));
                        report.skipped += 1;
                        continue;
                    }
                },
            };

            let mut tags = request.tags.clone();
            tags.extend(v.entry.tags.iter().map(|(k, val)| (k.clone(), val.clone())));

            let new_pool = NewPool {
                name: v.name.clone(),
                cidr: v.cidr,
                pool_type,
                status,
                parent_id,
                source: PoolSource::SchemaPlanner,
                description: v.entry.description.clone().unwrap_or_default(),
                tags,
            };

            match hierarchy.create_validated(cancel, new_pool, OverlapPolicy::Skip).await {
                Ok(pool) => {
                    report.created += 1;
                    report.pool_map.insert(v.reference.to_string(), pool.id);
                    if v.parent_ref.is_none() {
                        report.root_pool_id = Some(pool.id);
                    }
                }
                Err(IpamError::Cancelled) => {
                    let remaining = validated.len() - position;
                    debug!("Schema apply cancelled with {} entries left", remaining);
                    report.errors.push(format!(
                        "cancelled before pool '{}', {} entries not processed",
                        v.reference, remaining
                    ));
                    report.skipped += remaining;
                    break;
                }
                Err(e) => {
                    debug!("Schema apply: failed to create pool '{}': {}", v.reference, e);
                    report.errors.push(format!("pool '{}': {}", v.reference, e));
                    report.skipped += 1;
                }
            }
        }

        report
    }

    /// Unset or unknown types fall back to `subnet` with a warning
    fn resolve_type(&self, v: &ValidatedEntry<'_>, warnings: &mut Vec<String>) -> PoolType {
        match v.entry.pool_type.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            None => {
                warnings.push(format!("pool '{}': type not set, defaulting to subnet", v.reference));
                PoolType::Subnet
            }
            Some(raw) => raw.parse::<PoolType>().unwrap_or_else(|_| {
                warnings.push(format!(
                    "pool '{}': unknown type '{}', defaulting to subnet",
                    v.reference, raw
                ));
                PoolType::Subnet
            }),
        }
    }
}

/// Entries of one request may only overlap along their parent_ref chains
fn check_internal_overlaps(validated: &[ValidatedEntry<'_>]) -> Result<(), IpamError> {
    let chains: Vec<HashSet<usize>> = (0..validated.len())
        .map(|start| {
            let mut chain = HashSet::new();
            let mut current = Some(start);
            while let Some(position) = current {
                chain.insert(position);
                current = validated[position].parent_position;
            }
            chain
        })
        .collect();

    let index = PrefixIndex::build(validated.iter().map(|v| v.cidr));
    for (i, v) in validated.iter().enumerate() {
        for j in index.overlapping(&v.cidr).into_iter().filter(|j| *j < i) {
            if !chains[i].contains(&j) {
                return Err(IpamError::Validation(format!(
                    "pool '{}' ({}) overlaps pool '{}' ({}) but is not declared under it",
                    v.reference, v.cidr, validated[j].reference, validated[j].cidr
                )));
            }
        }
    }
    Ok(())
}
