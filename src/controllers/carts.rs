use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, MethodRouter},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{authenticated, AuthUser},
    store::{Collection, DeleteResult, Document, Filter, InsertOneResult},
    AppState,
};

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    // Запись в корзину открыта, если не включен STRICT_WRITES
    let guard_write = |route: MethodRouter<Arc<AppState>>| {
        if state.config.features.strict_writes {
            authenticated(state, route)
        } else {
            route
        }
    };

    Router::new()
        .route("/carts", authenticated(state, get(list_cart)).merge(guard_write(post(add_item))))
        .route("/carts/{id}", guard_write(delete(remove_item)))
}

#[derive(Debug, Deserialize)]
struct CartQuery {
    email: Option<String>,
}

/// GET /carts?email=
///
/// Только своя корзина: email из запроса обязан совпасть с email из токена.
async fn list_cart(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<CartQuery>,
) -> ApiResult<Json<Vec<Document>>> {
    let Some(email) = query.email.filter(|email| !email.is_empty()) else {
        return Ok(Json(Vec::new()));
    };

    if email != user.email {
        tracing::warn!("Cart of {} requested by {}", email, user.email);
        return Err(ApiError::Forbidden);
    }

    let items = state
        .store
        .find(Collection::Carts, &Filter::eq("email", email))
        .await?;
    Ok(Json(items))
}

/// POST /carts
async fn add_item(
    State(state): State<Arc<AppState>>,
    Json(item): Json<Document>,
) -> ApiResult<Json<InsertOneResult>> {
    let result = state.store.insert_one(Collection::Carts, item).await?;
    tracing::debug!("Cart item {} added", result.inserted_id);
    Ok(Json(result))
}

/// DELETE /carts/{id}
async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResult>> {
    let result = state
        .store
        .delete_one(Collection::Carts, &Filter::by_id(&id))
        .await?;
    Ok(Json(result))
}
