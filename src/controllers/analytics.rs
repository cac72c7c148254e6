//! analytics.rs
//!
//! Статистика для админки и отчет по категориям заказов.
//!
//! - `/admin-state`: число клиентов, позиций меню и заказов (приблизительные
//!   счетчики хранилища) плюс выручка, посчитанная по всем платежам в процессе.
//! - `/order-states`: платежи, соединенные с меню и сгруппированные по категории.

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use crate::{
    error::ApiResult,
    middleware::admin_only,
    models::{payment::revenue, AdminSummary},
    store::{CategoryStat, Collection, Filter},
    AppState,
};

/// Определяет маршруты, связанные с аналитикой.
pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin-state", admin_only(state, get(admin_state)))
        .route("/order-states", get(order_states))
}

/// GET /admin-state (admin)
async fn admin_state(State(state): State<Arc<AppState>>) -> ApiResult<Json<AdminSummary>> {
    let store = state.store.as_ref();
    // Выручка считается здесь, а не в хранилище: грузим все платежи.
    let (customers, products, orders, payments) = futures::try_join!(
        store.estimated_count(Collection::Users),
        store.estimated_count(Collection::Menu),
        store.estimated_count(Collection::Payments),
        store.find(Collection::Payments, &Filter::All),
    )?;

    let summary = AdminSummary {
        customers,
        products,
        orders,
        revenue: revenue(&payments),
    };

    tracing::info!(
        "Admin summary: {} customers, {} products, {} orders, revenue {:.2}",
        summary.customers, summary.products, summary.orders, summary.revenue
    );

    Ok(Json(summary))
}

/// GET /order-states
async fn order_states(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<CategoryStat>>> {
    let stats = state.store.order_states().await?;
    tracing::debug!("order-states: {:?}", stats);
    Ok(Json(stats))
}
