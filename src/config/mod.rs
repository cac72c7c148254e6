use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageBackend,
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    pub payment: PaymentConfig,
    pub features: FeatureFlags,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

// Где живут коллекции
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(()),
        }
    }
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки JWT
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_days: i64,
}

// Настройки платежного провайдера
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub secret_key: String,
    pub api_url: String,
    pub currency: String,
    pub timeout_seconds: u64,
}

// Feature flags для включения/выключения функциональности
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    /// Закрыть токеном запись в корзину и выдачу роли admin.
    pub strict_writes: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = or_default(key, default);
    value.parse().map_err(|_| ConfigError::Invalid { key, value })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage: StorageBackend = parsed("STORAGE_BACKEND", "postgres")?;

        let database = match storage {
            StorageBackend::Postgres => Some(DatabaseConfig {
                url: database_url()?,
                pool_size: parsed("DB_POOL_SIZE", "10")?,
            }),
            StorageBackend::Memory => None,
        };

        // JWT_TOKEN - старое имя переменной, оставлено для существующих .env
        let secret = required("JWT_SECRET")
            .or_else(|_| required("JWT_TOKEN"))
            .map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        Ok(Config {
            app: AppConfig {
                host: or_default("HOST", "0.0.0.0"),
                port: parsed("PORT", "5000")?,
                environment: or_default("ENVIRONMENT", "development"),
                rust_log: or_default("RUST_LOG", "bistro_api=debug,tower_http=debug"),
                log_format: parsed("LOG_FORMAT", "pretty")?,
            },
            storage,
            database,
            jwt: JwtConfig {
                secret,
                expires_in_days: parsed("JWT_EXPIRES_IN_DAYS", "300")?,
            },
            payment: PaymentConfig {
                secret_key: required("PAYMENT_SECRET_KEY")?,
                api_url: or_default("PAYMENT_API_URL", "https://api.stripe.com"),
                currency: or_default("PAYMENT_CURRENCY", "usd"),
                timeout_seconds: parsed("PAYMENT_TIMEOUT_SECONDS", "30")?,
            },
            features: FeatureFlags {
                strict_writes: parsed("STRICT_WRITES", "false")?,
            },
        })
    }
}

// DATABASE_URL целиком, либо собираем из частей
fn database_url() -> Result<String, ConfigError> {
    if let Ok(url) = env::var("DATABASE_URL") {
        return Ok(url);
    }
    let user = required("DB_USERNAME").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
    let password = required("DB_PASSWORD")?;
    let host = or_default("DB_HOST", "localhost:5432");
    let name = or_default("DB_NAME", "bistro");
    Ok(format!("postgres://{}:{}@{}/{}", user, password, host, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_known_names() {
        assert_eq!("postgres".parse::<StorageBackend>(), Ok(StorageBackend::Postgres));
        assert_eq!("PostgreSQL".parse::<StorageBackend>(), Ok(StorageBackend::Postgres));
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("mongo".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn invalid_value_names_the_variable() {
        let err = ConfigError::Invalid { key: "PORT", value: "abc".into() };
        assert_eq!(err.to_string(), "PORT has invalid value \"abc\"");
        assert_eq!(ConfigError::Missing("JWT_SECRET").to_string(), "JWT_SECRET must be set");
    }
}
