use crate::handlers::{
    ancestors, apply_schema, audit, check_schema, create_pool, get_pool, health_check, list_pools, search,
    subnets, update_pool,
};
use axum::routing::{get, post};
use axum::Router;
use ipam_core::{IpamConfig, PoolStore};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PoolStore>,
    pub config: Arc<IpamConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn PoolStore>, config: IpamConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/pools", get(list_pools).post(create_pool))
        .route("/pools/{id}", get(get_pool).patch(update_pool))
        .route("/pools/{id}/subnets", get(subnets))
        .route("/pools/{id}/ancestors", get(ancestors))
        .route("/audit", get(audit))
        .route("/schema/check", post(check_schema))
        .route("/schema/apply", post(apply_schema))
        .route("/search", get(search))
        .with_state(state);

    Router::new()
        .route("/healthz", get(health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
