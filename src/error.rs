use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::{services::payment::ProviderError, store::StoreError};

/// Ошибка обработчика. Всегда отдается клиенту как `{error: true, message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Нет заголовка Authorization.
    #[error("unauthorized access")]
    MissingToken,

    /// Токен есть, но не прошел проверку подписи или срока.
    #[error("unauthorized access")]
    InvalidToken,

    /// Личность подтверждена, но прав нет.
    #[error("forbidden access")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("internal server error")]
    Internal(String),

    #[error("internal server error")]
    Store(#[from] StoreError),

    #[error("payment provider error")]
    Provider(#[from] ProviderError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: bool,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::InvalidToken | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(detail) => tracing::error!("Internal error: {}", detail),
            ApiError::Store(e) => tracing::error!("Storage error: {}", e),
            ApiError::Provider(e) => {
                tracing::error!("Payment provider error (status {:?}): {}", e.status(), e)
            }
            _ => {}
        }

        let body = ErrorBody {
            error: true,
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_map_to_401_and_403() {
        assert_eq!(ApiError::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Forbidden.to_string(), "forbidden access");
        assert_eq!(ApiError::InvalidToken.to_string(), "unauthorized access");
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let err = ApiError::from(StoreError::InvalidDocument("secret detail".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "internal server error");
    }
}
