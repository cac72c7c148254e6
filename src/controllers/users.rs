use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{admin_only, authenticated, AuthUser},
    models::{user::ADMIN_ROLE, User},
    store::{Collection, Document, Filter},
    AppState,
};

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let grant_admin = patch(make_admin);
    let grant_admin = if state.config.features.strict_writes {
        admin_only(state, grant_admin)
    } else {
        grant_admin
    };

    Router::new()
        .route("/users", admin_only(state, get(list_users)).post(create_user))
        // GET принимает email, PATCH - id документа
        .route("/users/admin/{key}", authenticated(state, get(check_admin)).merge(grant_admin))
}

/// GET /users (admin)
async fn list_users(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Document>>> {
    let users = state.store.find(Collection::Users, &Filter::All).await?;
    Ok(Json(users))
}

/// GET /users/admin/{email}
///
/// Спросить можно только про себя: чужой email сразу дает `{admin: false}`.
async fn check_admin(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(email): Path<String>,
) -> ApiResult<Json<Value>> {
    if user.email != email {
        return Ok(Json(json!({ "admin": false })));
    }

    let admin = User::is_admin_email(&email, state.store.as_ref()).await?;
    Ok(Json(json!({ "admin": admin })))
}

/// POST /users
///
/// Регистрирует пользователя, если записи с таким email еще нет.
/// Проверка и вставка не атомарны: два параллельных запроса могут создать дубль.
async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(user): Json<Document>,
) -> ApiResult<Response> {
    let email = user
        .get("email")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("email is required"))?
        .to_string();

    if User::find_by_email(&email, state.store.as_ref()).await?.is_some() {
        return Ok(Json(json!({ "message": "user already exists" })).into_response());
    }

    let result = state.store.insert_one(Collection::Users, user).await?;
    tracing::info!("User {} registered as {}", email, result.inserted_id);
    Ok(Json(result).into_response())
}

/// PATCH /users/admin/{id}
async fn make_admin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let mut set = Document::new();
    set.insert("role".to_string(), Value::String(ADMIN_ROLE.to_string()));

    let result = state
        .store
        .update_one(Collection::Users, &Filter::by_id(&id), set)
        .await?;

    if result.matched_count == 0 {
        tracing::warn!("make_admin: user {} not found", id);
    } else {
        tracing::info!("User {} granted admin role", id);
    }
    Ok(Json(result))
}
