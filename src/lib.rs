pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::{Config, StorageBackend},
    database::PgStore,
    services::{
        payment::{PaymentProvider, StripeClient},
        tokens::TokenService,
    },
    store::{DocumentStore, MemoryStore},
};

/// Строка, которую отдает `GET /`.
pub const BANNER: &str = "bistro boss is running...";

// Shared state для всего приложения: собирается один раз в main и
// передается каждому обработчику через `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub tokens: TokenService,
    pub store: Arc<dyn DocumentStore>,
    pub payments: Arc<dyn PaymentProvider>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        payments: Arc<dyn PaymentProvider>,
    ) -> Arc<Self> {
        let tokens = TokenService::from_config(&config.jwt);
        Arc::new(Self { config, tokens, store, payments })
    }

    /// Подключает хранилище и платежного провайдера по конфигурации.
    pub async fn from_config(config: Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn DocumentStore> = match (config.storage, &config.database) {
            (StorageBackend::Postgres, Some(db)) => {
                let store = PgStore::new(&db.url, db.pool_size).await?;
                info!("Database connected");
                store.run_migrations().await?;
                Arc::new(store)
            }
            (StorageBackend::Postgres, None) => {
                anyhow::bail!("postgres storage selected but database is not configured")
            }
            (StorageBackend::Memory, _) => {
                info!("Using in-memory storage, data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let payments = Arc::new(StripeClient::from_config(&config.payment)?);

        Ok(Self::new(config, store, payments))
    }
}

/// Главный роутер со всеми маршрутами и общими слоями.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { BANNER }))
        .route("/health", get(|| async { "OK" }))
        .merge(controllers::routes(&state))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
