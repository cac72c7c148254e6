use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use crate::{
    error::ApiResult,
    store::{Collection, Document, Filter},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reviews", get(list_reviews))
}

/// GET /reviews
async fn list_reviews(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Document>>> {
    let reviews = state.store.find(Collection::Reviews, &Filter::All).await?;
    Ok(Json(reviews))
}
