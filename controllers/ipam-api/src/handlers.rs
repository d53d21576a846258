//! Request handlers
//!
//! Each handler builds the engine service it needs over the shared store and
//! runs it under a per-request cancellation token. The token is cancelled when
//! the handler future is dropped, e.g. because the client went away.

use crate::error::ApiError;
use crate::routes::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use ipam_core::cidr;
use ipam_core::{
    ApplyReport, ApplyRequest, CheckRequest, CheckResponse, ConflictChecker, InvariantViolation, Pool, PoolHierarchy,
    PoolId, PoolPatch, PoolSpec, Prefix, SchemaPlanner, SearchParams, SearchResponse, Searcher,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::info;

const DEFAULT_SUBNET_LIMIT: u64 = 256;
const MAX_SUBNET_LIMIT: u64 = 4096;

/// Token for one request plus the guard that cancels it on drop
fn request_token() -> (CancellationToken, DropGuard) {
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    (cancel, guard)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn list_pools(State(state): State<AppState>) -> Result<Json<Vec<Pool>>, ApiError> {
    let (cancel, _guard) = request_token();
    let pools = PoolHierarchy::new(&*state.store, &state.config).list(&cancel).await?;
    Ok(Json(pools))
}

pub async fn create_pool(
    State(state): State<AppState>,
    payload: Result<Json<PoolSpec>, JsonRejection>,
) -> Result<(StatusCode, Json<Pool>), ApiError> {
    let spec = body(payload)?;
    let (cancel, _guard) = request_token();
    let pool = PoolHierarchy::new(&*state.store, &state.config)
        .create(&cancel, &spec)
        .await?;
    info!("Created pool {} '{}' ({})", pool.id, pool.name, pool.cidr);
    Ok((StatusCode::CREATED, Json(pool)))
}

pub async fn get_pool(State(state): State<AppState>, Path(id): Path<PoolId>) -> Result<Json<Pool>, ApiError> {
    let (cancel, _guard) = request_token();
    let pool = PoolHierarchy::new(&*state.store, &state.config).get(&cancel, id).await?;
    Ok(Json(pool))
}

pub async fn update_pool(
    State(state): State<AppState>,
    Path(id): Path<PoolId>,
    payload: Result<Json<PoolPatch>, JsonRejection>,
) -> Result<Json<Pool>, ApiError> {
    let patch = body(payload)?;
    let (cancel, _guard) = request_token();
    let pool = PoolHierarchy::new(&*state.store, &state.config)
        .update(&cancel, id, &patch)
        .await?;
    Ok(Json(pool))
}

#[derive(Debug, Deserialize)]
pub struct SubnetsQuery {
    pub prefix_len: u8,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubnetsResponse {
    pub pool_id: PoolId,
    pub cidr: Prefix,
    pub prefix_len: u8,
    pub offset: u64,
    pub total: u64,
    pub usable_hosts: u64,
    pub blocks: Vec<Prefix>,
}

pub async fn subnets(
    State(state): State<AppState>,
    Path(id): Path<PoolId>,
    params: Result<Query<SubnetsQuery>, QueryRejection>,
) -> Result<Json<SubnetsResponse>, ApiError> {
    let params = query(params)?;
    let limit = params.limit.unwrap_or(DEFAULT_SUBNET_LIMIT).clamp(1, MAX_SUBNET_LIMIT);
    let (cancel, _guard) = request_token();

    let pool = PoolHierarchy::new(&*state.store, &state.config).get(&cancel, id).await?;
    let window = cidr::windowed_subnets(&pool.cidr, params.prefix_len, params.offset, limit)?;

    Ok(Json(SubnetsResponse {
        pool_id: pool.id,
        cidr: pool.cidr,
        prefix_len: params.prefix_len,
        offset: params.offset,
        total: window.total,
        usable_hosts: window.usable_hosts,
        blocks: window.blocks,
    }))
}

pub async fn ancestors(State(state): State<AppState>, Path(id): Path<PoolId>) -> Result<Json<Vec<Pool>>, ApiError> {
    let (cancel, _guard) = request_token();
    let chain = PoolHierarchy::new(&*state.store, &state.config)
        .ancestors(&cancel, id)
        .await?;
    Ok(Json(chain))
}

pub async fn audit(State(state): State<AppState>) -> Result<Json<Vec<InvariantViolation>>, ApiError> {
    let (cancel, _guard) = request_token();
    let violations = PoolHierarchy::new(&*state.store, &state.config).audit(&cancel).await?;
    Ok(Json(violations))
}

pub async fn check_schema(
    State(state): State<AppState>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<CheckResponse>, ApiError> {
    let request = body(payload)?;
    let (cancel, _guard) = request_token();
    let response = ConflictChecker::new(&*state.store, &state.config)
        .check(&cancel, &request)
        .await?;
    Ok(Json(response))
}

pub async fn apply_schema(
    State(state): State<AppState>,
    payload: Result<Json<ApplyRequest>, JsonRejection>,
) -> Result<Json<ApplyReport>, ApiError> {
    let request = body(payload)?;
    let (cancel, _guard) = request_token();
    let report = SchemaPlanner::new(&*state.store, &state.config)
        .apply(&cancel, &request)
        .await?;
    info!(
        "Schema apply: created={} skipped={} errors={}",
        report.created,
        report.skipped,
        report.errors.len()
    );
    Ok(Json(report))
}

pub async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let params = query(params)?;
    let (cancel, _guard) = request_token();
    let response = Searcher::new(&*state.store, &state.config)
        .search(&cancel, &params)
        .await?;
    Ok(Json(response))
}
