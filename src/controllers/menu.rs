use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::{
    error::ApiResult,
    middleware::admin_only,
    store::{Collection, DeleteResult, Document, Filter, InsertOneResult},
    AppState,
};

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/menu", get(list_menu).merge(admin_only(state, post(create_item))))
        .route("/menu/{id}", admin_only(state, delete(delete_item)))
}

/// GET /menu
async fn list_menu(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Document>>> {
    let items = state.store.find(Collection::Menu, &Filter::All).await?;
    Ok(Json(items))
}

/// POST /menu (admin)
async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(item): Json<Document>,
) -> ApiResult<Json<InsertOneResult>> {
    let result = state.store.insert_one(Collection::Menu, item).await?;
    tracing::info!("Menu item {} created", result.inserted_id);
    Ok(Json(result))
}

/// DELETE /menu/{id} (admin)
async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResult>> {
    let result = state
        .store
        .delete_one(Collection::Menu, &Filter::by_id(&id))
        .await?;
    tracing::info!("Menu item {} deleted: {}", id, result.deleted_count);
    Ok(Json(result))
}
