//! CIDR-aware search over pools and accounts
//!
//! Free text, `cidr_contains`, `cidr_within` and an entity-type filter combine
//! with logical AND. Results are paginated and `total` is the match count
//! before pagination.

use crate::cidr::{self, Prefix};
use crate::config::IpamConfig;
use crate::error::IpamError;
use crate::index::PrefixIndex;
use crate::models::{Account, Pool};
use crate::store_trait::PoolStore;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Raw query parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub cidr_contains: Option<String>,
    #[serde(default)]
    pub cidr_within: Option<String>,
    #[serde(rename = "type", default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Pool,
    Account,
}

impl FromStr for EntityType {
    type Err = IpamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pool" => Ok(EntityType::Pool),
            "account" => Ok(EntityType::Account),
            other => Err(IpamError::Validation(format!(
                "invalid search type '{}' (expected pool or account)",
                other
            ))),
        }
    }
}

/// Validated search request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Lowercased free text
    pub text: Option<String>,
    pub cidr_contains: Option<Prefix>,
    pub cidr_within: Option<Prefix>,
    pub entity_type: Option<EntityType>,
    /// 1-based
    pub page: usize,
    pub page_size: usize,
}

impl SearchQuery {
    pub fn from_params(params: &SearchParams, config: &IpamConfig) -> Result<Self, IpamError> {
        let text = non_blank(params.q.as_deref()).map(str::to_lowercase);
        let cidr_contains = non_blank(params.cidr_contains.as_deref())
            .map(|raw| parse_filter("cidr_contains", raw))
            .transpose()?;
        let cidr_within = non_blank(params.cidr_within.as_deref())
            .map(|raw| parse_filter("cidr_within", raw))
            .transpose()?;
        let entity_type = non_blank(params.entity_type.as_deref())
            .map(str::parse::<EntityType>)
            .transpose()?;

        if text.is_none() && cidr_contains.is_none() && cidr_within.is_none() {
            return Err(IpamError::Validation(
                "search requires a query (q) or a CIDR filter (cidr_contains, cidr_within)".to_string(),
            ));
        }

        let page = params
            .page
            .filter(|p| *p >= 1)
            .and_then(|p| usize::try_from(p).ok())
            .unwrap_or(1);
        let page_size = params
            .page_size
            .filter(|s| *s >= 1)
            .and_then(|s| usize::try_from(s).ok())
            .unwrap_or(config.default_page_size)
            .min(config.max_page_size);

        Ok(Self {
            text,
            cidr_contains,
            cidr_within,
            entity_type,
            page,
            page_size,
        })
    }

    fn wants(&self, entity: EntityType) -> bool {
        self.entity_type.is_none_or(|wanted| wanted == entity)
    }

    fn text_matches(&self, fields: &[&str]) -> bool {
        match &self.text {
            None => true,
            Some(needle) => fields.iter().any(|field| field.to_lowercase().contains(needle.as_str())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum SearchItem {
    Pool(Pool),
    Account(Account),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub items: Vec<SearchItem>,
    /// Matches before pagination
    pub total: usize,
    pub page: usize,
    /// As requested (after clamping), even when fewer items are returned
    pub page_size: usize,
}

/// Run a validated query over in-memory snapshots
pub fn search_snapshot(pools: &[Pool], accounts: &[Account], query: &SearchQuery) -> SearchResponse {
    let mut matched_pools: Vec<&Pool> = if query.wants(EntityType::Pool) {
        candidate_pools(pools, query)
            .into_iter()
            .filter(|pool| {
                let cidr = pool.cidr.to_string();
                query.text_matches(&[pool.name.as_str(), cidr.as_str()])
            })
            .collect()
    } else {
        Vec::new()
    };
    matched_pools.sort_by_key(|pool| pool.id);

    // cidr_within only applies to pools
    let mut matched_accounts: Vec<&Account> = if query.wants(EntityType::Account) && query.cidr_within.is_none() {
        accounts
            .iter()
            .filter(|account| match &query.cidr_contains {
                None => true,
                Some(needle) => account.cidr.is_some_and(|cidr| cidr::contains(&cidr, needle)),
            })
            .filter(|account| query.text_matches(&[account.name.as_str(), account.key.as_str()]))
            .collect()
    } else {
        Vec::new()
    };
    matched_accounts.sort_by_key(|account| account.id);

    let total = matched_pools.len() + matched_accounts.len();
    let skip = (query.page - 1).saturating_mul(query.page_size);
    let items = matched_pools
        .into_iter()
        .map(|pool| SearchItem::Pool(pool.clone()))
        .chain(matched_accounts.into_iter().map(|account| SearchItem::Account(account.clone())))
        .skip(skip)
        .take(query.page_size)
        .collect();

    SearchResponse {
        items,
        total,
        page: query.page,
        page_size: query.page_size,
    }
}

/// Pools passing the CIDR filters, via the prefix index
fn candidate_pools<'p>(pools: &'p [Pool], query: &SearchQuery) -> Vec<&'p Pool> {
    if query.cidr_contains.is_none() && query.cidr_within.is_none() {
        return pools.iter().collect();
    }

    let index = PrefixIndex::build(pools.iter().map(|pool| pool.cidr));
    let mut positions: Option<Vec<usize>> = None;
    if let Some(needle) = &query.cidr_contains {
        positions = Some(index.containing(needle));
    }
    if let Some(range) = &query.cidr_within {
        let within = index.contained_in(range);
        positions = Some(match positions {
            None => within,
            Some(current) => current.into_iter().filter(|p| within.binary_search(p).is_ok()).collect(),
        });
    }

    positions
        .unwrap_or_default()
        .into_iter()
        .map(|position| &pools[position])
        .collect()
}

pub struct Searcher<'a, S: PoolStore + ?Sized> {
    store: &'a S,
    config: &'a IpamConfig,
}

impl<'a, S: PoolStore + ?Sized> Searcher<'a, S> {
    pub fn new(store: &'a S, config: &'a IpamConfig) -> Self {
        Self { store, config }
    }

    pub async fn search(&self, cancel: &CancellationToken, params: &SearchParams) -> Result<SearchResponse, IpamError> {
        let query = SearchQuery::from_params(params, self.config)?;

        let pools = if query.wants(EntityType::Pool) {
            self.store.list_pools(cancel).await?
        } else {
            Vec::new()
        };
        let accounts = if query.wants(EntityType::Account) && query.cidr_within.is_none() {
            self.store.list_accounts(cancel).await?
        } else {
            Vec::new()
        };

        let response = search_snapshot(&pools, &accounts, &query);
        debug!("Search matched {} of {} pools and {} accounts", response.total, pools.len(), accounts.len());
        Ok(response)
    }
}

fn parse_filter(field: &str, raw: &str) -> Result<Prefix, IpamError> {
    cidr::parse(raw).map_err(|e| IpamError::Validation(format!("{}: {}", field, e)))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
