//! Шлюз авторизации.
//!
//! Два перехватчика, которые вешаются на маршрут по цепочке:
//! 1. [`require_token`] - есть валидный bearer-токен (401 без заголовка, 403 на плохой токен).
//!    Кладет [`AuthUser`] в extensions запроса.
//! 2. [`require_admin`] - владелец email из токена имеет роль admin (иначе 403).
//!    Работает только после `require_token`.
//!
//! Порядок "сначала проверить токен, потом права" обеспечивают хелперы
//! [`authenticated`] и [`admin_only`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
};
use std::sync::Arc;

use crate::{error::ApiError, models::User, services::tokens::Claims, AppState};

/// Личность, подтвержденная токеном.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub claims: Claims,
}

/// Достает токен из `Authorization: Bearer <token>`.
///
/// Нет заголовка - `MissingToken`; заголовок есть, но токена в нем нет - `InvalidToken`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::MissingToken)?
        .to_str()
        .map_err(|_| ApiError::InvalidToken)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::InvalidToken)
}

/// Переход Unauthenticated -> Authenticated.
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::warn!("Rejected bearer token: {}", e);
        ApiError::InvalidToken
    })?;

    req.extensions_mut().insert(AuthUser {
        email: claims.email.clone(),
        claims,
    });
    Ok(next.run(req).await)
}

/// Переход Authenticated -> Authorized(admin).
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let email = req
        .extensions()
        .get::<AuthUser>()
        .map(|user| user.email.clone())
        .ok_or(ApiError::MissingToken)?;

    if !User::is_admin_email(&email, state.store.as_ref()).await? {
        tracing::warn!("Admin access denied for {}", email);
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(req).await)
}

/// Маршрут только с валидным токеном.
pub fn authenticated(
    state: &Arc<AppState>,
    route: MethodRouter<Arc<AppState>>,
) -> MethodRouter<Arc<AppState>> {
    route.route_layer(from_fn_with_state(state.clone(), require_token))
}

/// Маршрут только для администратора. Слой, добавленный последним,
/// выполняется первым, поэтому токен проверяется раньше роли.
pub fn admin_only(
    state: &Arc<AppState>,
    route: MethodRouter<Arc<AppState>>,
) -> MethodRouter<Arc<AppState>> {
    route
        .route_layer(from_fn_with_state(state.clone(), require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_token))
}

// Extractor для обработчиков за `require_token`
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(ApiError::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn missing_header_is_401_class() {
        assert!(matches!(bearer_token(&headers(None)), Err(ApiError::MissingToken)));
    }

    #[test]
    fn header_without_token_is_invalid() {
        assert!(matches!(bearer_token(&headers(Some("Bearer"))), Err(ApiError::InvalidToken)));
        assert!(matches!(bearer_token(&headers(Some("Bearer   "))), Err(ApiError::InvalidToken)));
        assert!(matches!(bearer_token(&headers(Some("Basic abc"))), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn bearer_token_is_extracted() {
        let map = headers(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&map).unwrap(), "abc.def.ghi");
    }
}
