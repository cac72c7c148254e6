use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{authenticated, AuthUser},
    models::{payment::CART_ITEM_IDS_FIELD, Checkout},
    services::payment::to_minor_units,
    store::{Collection, Document},
    AppState,
};

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/create-payment-intent", authenticated(state, post(create_payment_intent)))
        .route("/payments", authenticated(state, post(record_payment)))
}

// --- Request/Response структуры ---
#[derive(Debug, Deserialize)]
struct CreateIntentRequest {
    price: Option<f64>,
}

/// POST /create-payment-intent
///
/// Создает намерение у провайдера и отдает клиенту только `clientSecret`.
async fn create_payment_intent(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateIntentRequest>,
) -> ApiResult<Json<Value>> {
    let price = req.price.ok_or_else(|| ApiError::bad_request("price is required"))?;
    let amount = to_minor_units(price)
        .ok_or_else(|| ApiError::bad_request("price is out of range"))?;

    let intent = state
        .payments
        .create_intent(amount, &state.config.payment.currency)
        .await?;

    tracing::info!("Payment intent {} for {}: amount={}", intent.id, user.email, amount);

    Ok(Json(json!({ "clientSecret": intent.client_secret })))
}

/// POST /payments
///
/// Сохраняет платеж и удаляет оплаченные позиции корзины одной транзакцией.
/// Факт списания у провайдера здесь не перепроверяется.
async fn record_payment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payment): Json<Document>,
) -> ApiResult<Json<Value>> {
    let checkout = Checkout::from_document(payment).ok_or_else(|| {
        ApiError::bad_request(format!("{} must be an array of cart item ids", CART_ITEM_IDS_FIELD))
    })?;
    let filter = checkout.cart_filter();

    let (insert_result, delete_result) = state
        .store
        .insert_and_delete_many(Collection::Payments, checkout.document, Collection::Carts, &filter)
        .await?;

    tracing::info!(
        "Payment {} recorded for {}: {} of {} cart items removed",
        insert_result.inserted_id,
        user.email,
        delete_result.deleted_count,
        checkout.cart_item_ids.len()
    );

    Ok(Json(json!({
        "insertResult": insert_result,
        "deleteResult": delete_result,
    })))
}
