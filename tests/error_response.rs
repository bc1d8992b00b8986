mod common;

use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::Value;
use servicehub::config::{Config, StoreBackend};
use servicehub::error::AppError;
use servicehub::models::{AppState, ListingSearch};
use servicehub::services::ListingService;
use time::macros::date;

use common::{book, memory_state, publish, register};

async fn body_json(error: AppError) -> (StatusCode, Value) {
    let response = error.into_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_status_codes() {
    let cases = [
        (AppError::validation("bad input"), StatusCode::BAD_REQUEST),
        (AppError::NotFound("listing"), StatusCode::NOT_FOUND),
        (AppError::Ownership("not yours"), StatusCode::FORBIDDEN),
        (AppError::conflict("taken"), StatusCode::CONFLICT),
        (AppError::DuplicateKey("email"), StatusCode::CONFLICT),
        (AppError::Db(sqlx::Error::RowNotFound), StatusCode::INTERNAL_SERVER_ERROR),
        (
            AppError::Config("missing".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (error, expected) in cases {
        assert_eq!(error.status_code(), expected, "{error}");
        let (status, _) = body_json(error).await;
        assert_eq!(status, expected);
    }
}

#[tokio::test]
async fn test_error_bodies_do_not_leak_internals() {
    let (_, body) = body_json(AppError::Db(sqlx::Error::PoolTimedOut)).await;
    assert_eq!(body["message"], "Database error");

    let (_, body) = body_json(AppError::NotFound("booking")).await;
    assert_eq!(body["message"], "booking not found");
    assert!(body.get("conflicting_booking").is_none());

    let (status, body) = body_json(uuid::Uuid::try_parse("nope").unwrap_err().into()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid identifier format");
}

#[tokio::test]
async fn test_conflict_body_carries_the_existing_booking() {
    let state = memory_state();
    let provider = register(&state, "tutor").await;
    let first = register(&state, "first").await;
    let second = register(&state, "second").await;
    let listing = publish(&state, &provider, "Calculus tutoring", "tutoring", 20.0).await;
    let day = date!(2025 - 03 - 01);

    let existing = book(&state, &first, listing.id, day, "10:00", 2).await.unwrap();
    let err = book(&state, &second, listing.id, day, "11:00", 1)
        .await
        .unwrap_err();

    let (status, body) = body_json(err).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let conflicting = &body["conflicting_booking"];
    assert_eq!(conflicting["id"], existing.id.to_string());
    assert_eq!(conflicting["date"], "2025-03-01");
    assert_eq!(conflicting["start_time"], "10:00");
    assert_eq!(conflicting["duration_hours"], 2);
    assert_eq!(conflicting["status"], "pending");
}

#[tokio::test]
async fn test_memory_state_lifecycle() {
    let config = Config::memory();
    assert_eq!(config.backend, StoreBackend::Memory);

    let state = AppState::open(&config).await.unwrap();
    let owner = register(&state, "tutor").await;
    publish(&state, &owner, "Calculus tutoring", "tutoring", 20.0).await;

    let page = ListingService::search(state.store(), ListingSearch::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    state.close().await;
}
