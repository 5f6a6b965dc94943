use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::AccountStore;
use crate::middleware::request_id::{make_span, propagate_request_id};
use crate::services::browse::BrowseService;
use crate::services::compare::CompareService;
use crate::services::refresh::RefreshScheduler;

pub mod accounts;
pub mod catalog;

/// Shared application state
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub browse: Arc<BrowseService>,
    pub compare: Arc<CompareService>,
    pub scheduler: Arc<dyn RefreshScheduler>,
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(middleware::from_fn(propagate_request_id))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/categories/:category_id/items", get(catalog::view_category))
        .route("/items/compare", get(catalog::compare_items))
        .route("/items/:item_id", get(catalog::view_item))
        .route("/accounts", post(accounts::create_account))
        .route(
            "/accounts/:username/profile",
            put(accounts::update_profile).get(accounts::get_profile),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
