pub mod tokens;
pub mod users;
pub mod menu;
pub mod reviews;
pub mod carts;
pub mod payment;
pub mod analytics;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Все маршруты API. Перехватчики авторизации цепляются к конкретным
/// методам, поэтому `state` нужен уже при сборке.
pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(tokens::routes())
        .merge(users::routes(state))
        .merge(menu::routes(state))
        .merge(reviews::routes())
        .merge(carts::routes(state))
        .merge(payment::routes(state))
        .merge(analytics::routes(state))
}
