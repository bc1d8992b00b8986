//! # Configuration
//!
//! Runtime settings read from the process environment, optionally seeded
//! from a `.env` file by [`Config::load`].
//!
//! # Environment Variables
//!
//! - `STORE_BACKEND` - "postgres" (default) or "memory"
//! - `DATABASE_URL` - Required for the Postgres backend
//! - `DATABASE_MAX_CONNECTIONS` - Pool size, defaults to [`DEFAULT_MAX_CONNECTIONS`]
//! - `ALLOWED_DOMAINS` - Registration domain suffixes, see [`EMAIL_REGEX`]
//!
//! [`EMAIL_REGEX`]: crate::utils::validator::EMAIL_REGEX

use std::env;

use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::utils::constant::DEFAULT_MAX_CONNECTIONS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Config {
    /// Loads `.env` from the working directory if present, then reads the
    /// environment. Variables already set take precedence over the file.
    pub fn load() -> AppResult<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            warn!(error = %e, "Ignoring unreadable .env file");
        }
        Self::from_env()
    }

    /// Reads the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for an unknown backend, or when the
    /// Postgres backend is selected without `DATABASE_URL`.
    pub fn from_env() -> AppResult<Self> {
        let backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(AppError::Config(format!("unknown STORE_BACKEND `{other}`")));
            }
        };

        let database_url = env::var("DATABASE_URL").ok();
        if backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::Config(
                "Env variable `DATABASE_URL` should be set".to_string(),
            ));
        }

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or_else(|| {
                if env::var("DATABASE_MAX_CONNECTIONS").is_ok() {
                    warn!(
                        "Invalid DATABASE_MAX_CONNECTIONS, using fallback value {DEFAULT_MAX_CONNECTIONS}"
                    );
                }
                DEFAULT_MAX_CONNECTIONS
            });

        info!(?backend, max_connections, "Loaded configuration");

        Ok(Self {
            backend,
            database_url,
            max_connections,
        })
    }

    /// In-process configuration for development and tests.
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}
