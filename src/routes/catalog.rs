use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    services::browse::ItemRecommendation,
    services::compare::CompareResult,
};

use super::AppState;

/// Optional viewer identity for browse endpoints
#[derive(Debug, Deserialize)]
pub struct ViewerParams {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub username: String,
    pub first: String,
    pub second: String,
}

/// Handler for category listings with per-item recommendation views
pub async fn view_category(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(category_id): Path<String>,
    Query(params): Query<ViewerParams>,
) -> AppResult<Json<Vec<ItemRecommendation>>> {
    tracing::info!(
        request_id = %request_id,
        category_id = %category_id,
        "Processing category view"
    );

    let views = state
        .browse
        .category_view(params.username.as_deref(), &category_id)
        .await?;

    Ok(Json(views))
}

/// Handler for a single item view
pub async fn view_item(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(item_id): Path<String>,
    Query(params): Query<ViewerParams>,
) -> AppResult<Json<ItemRecommendation>> {
    tracing::info!(
        request_id = %request_id,
        item_id = %item_id,
        "Processing item view"
    );

    let view = state
        .browse
        .item_view(params.username.as_deref(), &item_id)
        .await?;

    Ok(Json(view))
}

/// Handler for the two-item comparison popup
pub async fn compare_items(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<CompareParams>,
) -> AppResult<Json<CompareResult>> {
    tracing::info!(
        request_id = %request_id,
        first = %params.first,
        second = %params.second,
        "Processing item comparison"
    );

    let result = state
        .compare
        .compare(&params.username, &params.first, &params.second)
        .await?;

    Ok(Json(result))
}
