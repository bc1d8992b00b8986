use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{Config, StoreBackend};
use crate::error::{AppError, AppResult};
use crate::store::{MemoryStore, PgStore, Store};

/// Application state shared across requests. Needs to be thread-safe.
///
/// The store is constructed explicitly and handed to every service call;
/// there is no process-wide connection.
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend for users, listings, bookings and reviews.
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        info!("Initializing application state");
        Self { store }
    }

    /// Opens the backend selected by `config`. The Postgres backend connects
    /// and applies pending migrations before returning.
    #[instrument(skip_all, fields(backend = ?config.backend))]
    pub async fn open(config: &Config) -> AppResult<Self> {
        let store: Arc<dyn Store> = match config.backend {
            StoreBackend::Postgres => {
                let url = config.database_url.as_deref().ok_or_else(|| {
                    AppError::Config("Env variable `DATABASE_URL` should be set".to_string())
                })?;
                Arc::new(PgStore::open(url, config.max_connections).await?)
            }
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };

        Ok(Self::new(store))
    }

    #[inline]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Releases the backend's connections. The state must not be used afterwards.
    pub async fn close(&self) {
        self.store.close().await;
        info!("Application state closed");
    }
}
