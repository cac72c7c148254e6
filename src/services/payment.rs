//! payment.rs
//!
//! Сервисный слой для работы с внешним платежным провайдером (Stripe).
//!
//! Ключевые компоненты:
//! 1.  **PaymentProvider**: трейт "создать платежное намерение". Обработчики
//!     получают провайдера через `AppState`, в тестах подставляется заглушка.
//! 2.  **StripeClient**: реальный клиент, `POST /v1/payment_intents`.
//! 3.  **to_minor_units**: перевод суммы из долларов в центы без потерь
//!     на двоичной арифметике с плавающей точкой.
//!
//! Повторов и идемпотентности нет: одна попытка на запрос.

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::config::PaymentConfig;

/// Платежное намерение, созданное у провайдера.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    /// Секрет, с которым клиент завершает оплату на своей стороне.
    pub client_secret: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("payment provider returned no client secret")]
    MissingClientSecret,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Создает намерение на `amount` минимальных единиц валюты (центов).
    async fn create_intent(&self, amount: i64, currency: &str) -> Result<PaymentIntent, ProviderError>;
}

/// Переводит сумму в минимальные единицы: умножение на 100 и отбрасывание дробной части.
///
/// Считается в десятичной арифметике по кратчайшему представлению числа,
/// поэтому `19.99` дает `1999`, а не `1998`. `None` для нечисел и переполнения.
pub fn to_minor_units(price: f64) -> Option<i64> {
    if !price.is_finite() {
        return None;
    }
    let exact = Decimal::from_str(&price.to_string()).ok()?;
    exact.checked_mul(Decimal::ONE_HUNDRED)?.trunc().to_i64()
}

// --- Модели данных для API Stripe ---

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Клиент Stripe API.
#[derive(Clone)]
pub struct StripeClient {
    /// Секретный ключ аккаунта.
    secret_key: String,
    /// Базовый URL API (подменяется в тестах).
    base_url: String,
    /// Асинхронный HTTP-клиент.
    http_client: reqwest::Client,
}

impl StripeClient {
    pub fn from_config(config: &PaymentConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            secret_key: config.secret_key.clone(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_intent(&self, amount: i64, currency: &str) -> Result<PaymentIntent, ProviderError> {
        info!("Creating payment intent: amount={}, currency={}", amount, currency);

        let form = [
            ("amount", amount.to_string()),
            ("currency", currency.to_string()),
            ("payment_method_types[]", "card".to_string()),
        ];

        let response = self
            .http_client
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
            error!("Payment provider rejected intent: status={}, message={}", status, message);
            return Err(ProviderError::Rejected { status: status.as_u16(), message });
        }

        let intent: IntentResponse = response.json().await?;
        let client_secret = intent.client_secret.ok_or(ProviderError::MissingClientSecret)?;

        info!("Payment intent {} created", intent.id);
        Ok(PaymentIntent { id: intent.id, client_secret })
    }
}

impl ProviderError {
    /// HTTP-статус ответа провайдера, если он был.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProviderError::Http(e) => e.status(),
            ProviderError::Rejected { status, .. } => StatusCode::from_u16(*status).ok(),
            ProviderError::MissingClientSecret => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> StripeClient {
        StripeClient::from_config(&PaymentConfig {
            secret_key: "sk_test_123".into(),
            api_url: format!("{}/", server.uri()),
            currency: "usd".into(),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[test]
    fn minor_units_truncate_instead_of_round() {
        assert_eq!(to_minor_units(19.99), Some(1999));
        assert_eq!(to_minor_units(0.29), Some(29));
        assert_eq!(to_minor_units(10.0), Some(1000));
        assert_eq!(to_minor_units(1.239), Some(123));
        assert_eq!(to_minor_units(0.0), Some(0));
    }

    #[test]
    fn minor_units_reject_non_finite_and_huge_values() {
        assert_eq!(to_minor_units(f64::NAN), None);
        assert_eq!(to_minor_units(f64::INFINITY), None);
        assert_eq!(to_minor_units(1e300), None);
    }

    proptest! {
        #[test]
        fn whole_cent_prices_convert_exactly(cents in 0i64..10_000_000) {
            let price = cents as f64 / 100.0;
            prop_assert_eq!(to_minor_units(price), Some(cents));
        }
    }

    #[tokio::test]
    async fn create_intent_posts_form_and_returns_client_secret() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("authorization", "Bearer sk_test_123"))
            .and(body_string_contains("amount=1999"))
            .and(body_string_contains("currency=usd"))
            .and(body_string_contains("payment_method_types%5B%5D=card"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_123",
                "object": "payment_intent",
                "client_secret": "pi_123_secret_abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let intent = client_for(&server).create_intent(1999, "usd").await.unwrap();
        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.client_secret, "pi_123_secret_abc");
    }

    #[tokio::test]
    async fn provider_error_envelope_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"type": "invalid_request_error", "message": "Amount must be at least 50 cents"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).create_intent(10, "usd").await.unwrap_err();
        match &err {
            ProviderError::Rejected { status, message } => {
                assert_eq!(*status, 400);
                assert_eq!(message, "Amount must be at least 50 cents");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn missing_client_secret_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "pi_1"})))
            .mount(&server)
            .await;

        let err = client_for(&server).create_intent(500, "usd").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingClientSecret));
    }
}
