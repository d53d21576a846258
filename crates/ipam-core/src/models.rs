//! IPAM domain models
//!
//! Pools, accounts and the request-scoped schema entry. Wire names follow the
//! JSON shapes the HTTP boundary exposes (`type`, `ref`, snake_case values).

use crate::cidr::Prefix;
use crate::error::IpamError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type PoolId = u64;
pub type AccountId = u64;

/// Open key/value annotations
pub type Tags = BTreeMap<String, String>;

/// Reads an explicit `null` the same as an omitted field
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Pool classification; descriptive only, never enforced structurally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolType {
    Supernet,
    Region,
    Environment,
    /// A VPC or cloud account allocation
    #[serde(alias = "account")]
    Vpc,
    Subnet,
}

impl PoolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolType::Supernet => "supernet",
            PoolType::Region => "region",
            PoolType::Environment => "environment",
            PoolType::Vpc => "vpc",
            PoolType::Subnet => "subnet",
        }
    }
}

impl FromStr for PoolType {
    type Err = IpamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supernet" => Ok(PoolType::Supernet),
            "region" => Ok(PoolType::Region),
            "environment" => Ok(PoolType::Environment),
            "vpc" | "account" => Ok(PoolType::Vpc),
            "subnet" => Ok(PoolType::Subnet),
            other => Err(IpamError::Validation(format!(
                "invalid pool type '{}' (expected supernet, region, environment, vpc or subnet)",
                other
            ))),
        }
    }
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    #[default]
    Planned,
    Active,
    Deprecated,
}

impl PoolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::Planned => "planned",
            PoolStatus::Active => "active",
            PoolStatus::Deprecated => "deprecated",
        }
    }
}

impl FromStr for PoolStatus {
    type Err = IpamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planned" => Ok(PoolStatus::Planned),
            "active" => Ok(PoolStatus::Active),
            "deprecated" => Ok(PoolStatus::Deprecated),
            other => Err(IpamError::Validation(format!(
                "invalid pool status '{}' (expected planned, active or deprecated)",
                other
            ))),
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolSource {
    #[default]
    Manual,
    Discovered,
    SchemaPlanner,
}

impl PoolSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolSource::Manual => "manual",
            PoolSource::Discovered => "discovered",
            PoolSource::SchemaPlanner => "schema_planner",
        }
    }
}

impl FromStr for PoolSource {
    type Err = IpamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(PoolSource::Manual),
            "discovered" => Ok(PoolSource::Discovered),
            "schema_planner" | "schema-planner" => Ok(PoolSource::SchemaPlanner),
            other => Err(IpamError::Validation(format!("invalid pool source '{}'", other))),
        }
    }
}

/// A named, typed allocation of address space, optionally nested under a parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub name: String,
    pub cidr: Prefix,
    #[serde(rename = "type")]
    pub pool_type: PoolType,
    pub status: PoolStatus,
    /// Declared parent; set once at creation, never derived from addresses
    pub parent_id: Option<PoolId>,
    pub source: PoolSource,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Tags,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input handed to the storage layer
#[derive(Debug, Clone, PartialEq)]
pub struct NewPool {
    pub name: String,
    pub cidr: Prefix,
    pub pool_type: PoolType,
    pub status: PoolStatus,
    pub parent_id: Option<PoolId>,
    pub source: PoolSource,
    pub description: String,
    pub tags: Tags,
}

/// Mutable pool fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolUpdate {
    pub status: Option<PoolStatus>,
    pub description: Option<String>,
    pub tags: Option<Tags>,
}

impl PoolUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.description.is_none() && self.tags.is_none()
    }

    pub fn apply_to(&self, pool: &mut Pool) {
        if let Some(status) = self.status {
            pool.status = status;
        }
        if let Some(description) = &self.description {
            pool.description = description.clone();
        }
        if let Some(tags) = &self.tags {
            pool.tags = tags.clone();
        }
    }
}

/// A cloud account (or other owner) that pools can be allocated to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Provider-scoped key, e.g. `aws:123456789012`
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub cidr: Option<Prefix>,
    #[serde(default)]
    pub description: String,
}

/// One node of a bulk-planned pool tree
///
/// `ref` is a request-local symbolic key and is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntry {
    #[serde(rename = "ref", default)]
    pub reference: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cidr: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub pool_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

impl SchemaEntry {
    pub fn new(reference: &str, name: &str, cidr: &str) -> Self {
        Self {
            reference: reference.to_string(),
            name: name.to_string(),
            cidr: cidr.to_string(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, pool_type: &str) -> Self {
        self.pool_type = Some(pool_type.to_string());
        self
    }

    pub fn with_parent(mut self, parent_ref: &str) -> Self {
        self.parent_ref = Some(parent_ref.to_string());
        self
    }

    /// The parent ref, treating an empty or blank string as "no parent"
    pub fn parent(&self) -> Option<&str> {
        self.parent_ref
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}
