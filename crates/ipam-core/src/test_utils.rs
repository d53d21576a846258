//! Shared fixtures for unit tests

use crate::cidr;
use crate::memory::MemoryStore;
use crate::models::*;
use chrono::Utc;

/// A stored pool with sensible defaults
pub fn pool(id: PoolId, name: &str, cidr: &str, parent_id: Option<PoolId>) -> Pool {
    let now = Utc::now();
    Pool {
        id,
        name: name.to_string(),
        cidr: cidr::parse(cidr).expect("fixture cidr should parse"),
        pool_type: PoolType::Subnet,
        status: PoolStatus::Active,
        parent_id,
        source: PoolSource::Manual,
        description: String::new(),
        tags: Tags::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn account(id: AccountId, key: &str, name: &str, cidr: Option<&str>) -> Account {
    Account {
        id,
        key: key.to_string(),
        name: name.to_string(),
        provider: "aws".to_string(),
        cidr: cidr.map(|c| cidr::parse(c).expect("fixture cidr should parse")),
        description: String::new(),
    }
}

pub fn store_with(pools: Vec<Pool>) -> MemoryStore {
    MemoryStore::with_pools(pools)
}
