use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    services::tokens::TokenError,
    store::Document,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tokens", post(issue_token))
}

/// POST /tokens
///
/// Подписывает присланный объект как есть. Пароль не проверяется.
async fn issue_token(
    State(state): State<Arc<AppState>>,
    Json(identity): Json<Document>,
) -> ApiResult<Json<Value>> {
    let token = state.tokens.issue(identity).map_err(|e| match e {
        TokenError::MissingEmail => ApiError::bad_request(e.to_string()),
        TokenError::Jwt(e) => ApiError::Internal(format!("failed to sign token: {}", e)),
    })?;

    Ok(Json(json!({ "token": token })))
}
