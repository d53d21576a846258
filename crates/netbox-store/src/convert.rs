//! Mapping between pools/accounts and NetBox prefixes/tenants
//!
//! Pool metadata NetBox has no native field for lives in custom fields on the
//! prefix. These custom fields must exist in NetBox before the store is used.

use crate::error::NetBoxStoreError;
use crate::models::{NetBoxPrefix, NetBoxTenant};
use chrono::{DateTime, Utc};
use ipam_core::cidr;
use ipam_core::{Account, NewPool, Pool, PoolSource, PoolStatus, PoolType, PoolUpdate, Tags};
use serde_json::{json, Map, Value};

pub const CF_POOL_NAME: &str = "ipam_pool_name";
pub const CF_POOL_TYPE: &str = "ipam_pool_type";
pub const CF_PARENT_ID: &str = "ipam_parent_id";
pub const CF_SOURCE: &str = "ipam_source";
pub const CF_TAGS: &str = "ipam_tags";
pub const CF_PROVIDER: &str = "ipam_provider";
pub const CF_ACCOUNT_CIDR: &str = "ipam_account_cidr";

pub fn status_to_netbox(status: PoolStatus) -> &'static str {
    match status {
        PoolStatus::Planned => "reserved",
        PoolStatus::Active => "active",
        PoolStatus::Deprecated => "deprecated",
    }
}

/// `container` counts as active; anything unrecognised as planned
pub fn status_from_netbox(value: &str) -> PoolStatus {
    match value {
        "active" | "container" => PoolStatus::Active,
        "deprecated" => PoolStatus::Deprecated,
        _ => PoolStatus::Planned,
    }
}

fn custom_str<'v>(fields: &'v Value, key: &str) -> Option<&'v str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn custom_tags(fields: &Value) -> Tags {
    match fields.get(CF_TAGS) {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        _ => Tags::new(),
    }
}

fn timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Map a NetBox prefix to a pool; IPv6 prefixes map to `None`
pub fn pool_from_prefix(prefix: &NetBoxPrefix) -> Result<Option<Pool>, NetBoxStoreError> {
    if prefix.prefix.contains(':') {
        return Ok(None);
    }
    let cidr = cidr::parse(&prefix.prefix)
        .map_err(|e| NetBoxStoreError::Malformed(format!("prefix {}: {}", prefix.id, e)))?;

    let fields = &prefix.custom_fields;
    let name = custom_str(fields, CF_POOL_NAME)
        .or_else(|| Some(prefix.description.trim()).filter(|d| !d.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| prefix.prefix.clone());
    let pool_type = custom_str(fields, CF_POOL_TYPE)
        .and_then(|t| t.parse::<PoolType>().ok())
        .unwrap_or(PoolType::Subnet);
    let source = custom_str(fields, CF_SOURCE)
        .and_then(|s| s.parse::<PoolSource>().ok())
        .unwrap_or(PoolSource::Discovered);
    let parent_id = fields.get(CF_PARENT_ID).and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });

    Ok(Some(Pool {
        id: prefix.id,
        name,
        cidr,
        pool_type,
        status: status_from_netbox(prefix.status.value()),
        parent_id,
        source,
        description: prefix.description.clone(),
        tags: custom_tags(fields),
        created_at: timestamp(prefix.created.as_deref()),
        updated_at: timestamp(prefix.last_updated.as_deref()),
    }))
}

fn tags_value(tags: &Tags) -> Value {
    Value::Object(tags.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect::<Map<_, _>>())
}

/// Request body creating a prefix for a new pool
pub fn prefix_body(pool: &NewPool) -> Value {
    json!({
        "prefix": pool.cidr.to_string(),
        "status": status_to_netbox(pool.status),
        "description": pool.description,
        "custom_fields": {
            CF_POOL_NAME: pool.name,
            CF_POOL_TYPE: pool.pool_type.as_str(),
            CF_PARENT_ID: pool.parent_id,
            CF_SOURCE: pool.source.as_str(),
            CF_TAGS: tags_value(&pool.tags),
        },
    })
}

/// PATCH body; only the fields set in the update are sent
pub fn update_body(update: &PoolUpdate) -> Value {
    let mut body = json!({});
    if let Some(status) = update.status {
        body["status"] = Value::String(status_to_netbox(status).to_string());
    }
    if let Some(description) = &update.description {
        body["description"] = Value::String(description.clone());
    }
    if let Some(tags) = &update.tags {
        body["custom_fields"] = json!({ CF_TAGS: tags_value(tags) });
    }
    body
}

/// Map a NetBox tenant to an account; an unparseable account CIDR is dropped
pub fn account_from_tenant(tenant: &NetBoxTenant) -> Account {
    let fields = &tenant.custom_fields;
    Account {
        id: tenant.id,
        key: tenant.slug.clone(),
        name: tenant.name.clone(),
        provider: custom_str(fields, CF_PROVIDER).unwrap_or_default().to_string(),
        cidr: custom_str(fields, CF_ACCOUNT_CIDR).and_then(|c| cidr::parse(c).ok()),
        description: tenant.description.clone(),
    }
}
