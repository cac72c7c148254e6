//! tokens.rs
//!
//! Выпуск и проверка bearer-токенов (JWT, HS256).
//!
//! Токен несет объект, присланный клиентом (обязательно с полем `email`),
//! плюс `iat`/`exp`. Учетные данные при выпуске не проверяются, отзыва нет:
//! любой клиент может получить токен на любой email.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::JwtConfig;

/// Полезная нагрузка токена.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    /// Остальные поля объекта, присланного при выпуске.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("identity claim must contain a string email")]
    MissingEmail,

    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // aud может прийти от клиента как обычное поле
        validation.validate_aud = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(&config.secret, Duration::days(config.expires_in_days))
    }

    /// Подписывает объект клиента. `iat`/`exp` всегда выставляет сервер.
    pub fn issue(&self, mut identity: Map<String, Value>) -> Result<String, TokenError> {
        let email = match identity.remove("email") {
            Some(Value::String(email)) => email,
            _ => return Err(TokenError::MissingEmail),
        };
        identity.remove("iat");
        identity.remove("exp");

        let now = Utc::now();
        let claims = Claims {
            email,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            extra: identity,
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Проверяет подпись и срок действия.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::days(300))
    }

    #[test]
    fn issued_token_carries_identity_and_expires_in_300_days() {
        let tokens = service();
        let token = tokens
            .issue(identity(json!({"email": "chef@bistro.io", "name": "Chef"})))
            .unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.email, "chef@bistro.io");
        assert_eq!(claims.extra.get("name"), Some(&json!("Chef")));
        assert_eq!(claims.exp - claims.iat, Duration::days(300).num_seconds());
    }

    #[test]
    fn client_supplied_expiry_is_ignored() {
        let tokens = service();
        let token = tokens
            .issue(identity(json!({"email": "a@b.c", "exp": 1, "iat": 1})))
            .unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert!(claims.exp > Utc::now().timestamp());
        assert!(!claims.extra.contains_key("exp"));
    }

    #[test]
    fn identity_without_email_is_rejected() {
        let tokens = service();
        assert!(matches!(
            tokens.issue(identity(json!({"name": "anon"}))),
            Err(TokenError::MissingEmail)
        ));
        assert!(matches!(
            tokens.issue(identity(json!({"email": 42}))),
            Err(TokenError::MissingEmail)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_fails() {
        let other = TokenService::new("other-secret", Duration::days(1));
        let token = other.issue(identity(json!({"email": "a@b.c"}))).unwrap();
        assert!(service().verify(&token).is_err());
    }

    #[test]
    fn expired_token_fails() {
        let expired = TokenService::new("test-secret", Duration::days(-2));
        let token = expired.issue(identity(json!({"email": "a@b.c"}))).unwrap();
        assert!(service().verify(&token).is_err());
    }

    #[test]
    fn malformed_token_fails() {
        assert!(service().verify("not-a-jwt").is_err());
        assert!(service().verify("").is_err());
    }
}
