//! # Centralized Error Handling
//!
//! Every core operation fails fast with an [`AppError`]. The same type maps
//! onto HTTP status codes for whatever routing layer embeds the crate, so
//! callers never translate errors by hand.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::models::Booking;

/// Central application error type that encompasses all possible error conditions.
///
/// _Storage errors are logged when converted into a response, other errors
/// should be logged at the point of creation if needed._
#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error")]
    Db(#[from] sqlx::Error),

    #[error("migration error")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("invalid identifier")]
    Uuid(#[from] uuid::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Ownership(&'static str),

    #[error("conflict: {message}")]
    Conflict {
        message: &'static str,
        booking: Option<Box<Booking>>,
    },

    #[error("duplicate {0}")]
    DuplicateKey(&'static str),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    #[inline]
    pub fn validation(reason: impl Into<String>) -> Self {
        AppError::Validation(reason.into())
    }

    #[inline]
    pub fn conflict(message: &'static str) -> Self {
        AppError::Conflict {
            message,
            booking: None,
        }
    }

    /// Overlap with an existing active booking. The booking travels with the
    /// error so the caller can offer alternatives.
    #[inline]
    pub fn booking_conflict(booking: Booking) -> Self {
        AppError::Conflict {
            message: "requested time overlaps an existing booking",
            booking: Some(Box::new(booking)),
        }
    }

    /// The conflicting booking, if this is a booking overlap.
    pub fn conflicting_booking(&self) -> Option<&Booking> {
        match self {
            AppError::Conflict {
                booking: Some(booking),
                ..
            } => Some(booking),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Db(_) | AppError::Migrate(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Uuid(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Ownership(_) => StatusCode::FORBIDDEN,
            AppError::Conflict { .. } | AppError::DuplicateKey(_) => StatusCode::CONFLICT,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflicting_booking: Option<Booking>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Db(e) => error!(?e, "Database error occurred"),
            AppError::Migrate(e) => error!(?e, "Migration error occurred"),
            AppError::Config(e) => error!(%e, "Configuration error occurred"),
            _ => {}
        }

        let status = self.status_code();
        let message = match &self {
            AppError::Db(_) | AppError::Migrate(_) => "Database error".to_string(),
            AppError::Config(_) => "Internal server error".to_string(),
            AppError::Uuid(_) => "Invalid identifier format".to_string(),
            AppError::Validation(reason) => reason.clone(),
            AppError::NotFound(what) => format!("{what} not found"),
            AppError::Ownership(reason) => (*reason).to_string(),
            AppError::Conflict { message, .. } => (*message).to_string(),
            AppError::DuplicateKey(field) => format!("{field} already in use"),
        };

        let conflicting_booking = match self {
            AppError::Conflict { booking, .. } => booking.map(|b| *b),
            _ => None,
        };

        let body = Json(ErrorBody {
            message,
            conflicting_booking,
        });
        (status, body).into_response()
    }
}

/// Convenience Result type alias that uses AppError as the error type.
pub type AppResult<T> = Result<T, AppError>;
