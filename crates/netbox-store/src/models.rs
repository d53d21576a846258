//! NetBox API models
//!
//! Subsets of the NetBox prefix and tenant serializers: only the fields the
//! pool store reads. Unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// NetBox API response wrapper (for paginated responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// A choice field; NetBox returns `{"value", "label"}` objects but accepts plain strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceValue {
    Labeled { value: String },
    Plain(String),
}

impl ChoiceValue {
    pub fn value(&self) -> &str {
        match self {
            ChoiceValue::Labeled { value } | ChoiceValue::Plain(value) => value,
        }
    }
}

/// Prefix fields used to back a pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetBoxPrefix {
    pub id: u64,
    pub prefix: String, // e.g., "10.1.0.0/16"
    pub status: ChoiceValue,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub custom_fields: serde_json::Value,
    #[serde(default)]
    pub created: Option<String>, // ISO 8601 datetime
    #[serde(default)]
    pub last_updated: Option<String>, // ISO 8601 datetime
}

/// Tenant fields used to back an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetBoxTenant {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub custom_fields: serde_json::Value,
}
