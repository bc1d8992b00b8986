//! # ServiceHub - Student Services Marketplace Core
//!
//! Conflict-free booking of listed services, listing search with rating
//! aggregates, and review summaries. Routing and sessions live outside the
//! crate; callers pass an authenticated user id and an [`AppState`] holding
//! the store.
//!
//! ```no_run
//! # async fn run() -> servicehub::error::AppResult<()> {
//! use servicehub::{config::Config, models::{AppState, ListingSearch}, services::ListingService};
//!
//! let state = AppState::open(&Config::load()?).await?;
//! let page = ListingService::search(state.store(), ListingSearch::default()).await?;
//! state.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Environment-driven runtime settings
//! - [`error`] - Application error type and its HTTP mapping
//! - [`models`] - Records, request payloads and shared state
//! - [`services`] - Business logic (availability, listings, bookings, reviews, users)
//! - [`store`] - Persistence trait with Postgres and in-memory backends
//! - [`telemetry`] - Tracing subscriber setup
//! - [`utils`] - Constants and input validation helpers
//!
//! [`AppState`]: models::AppState

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod utils;
