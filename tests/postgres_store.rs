mod common;

use std::sync::Arc;

use servicehub::error::AppError;
use servicehub::models::{AppState, ListingSearch, ReviewPageQuery};
use servicehub::services::{BookingService, ListingService, ReviewService, TimeSlot};
use servicehub::store::PgStore;
use sqlx::PgPool;
use time::macros::{date, time};

use common::{book, booking_request, init_tracing_once, listing_request, publish, register, review};

fn pg_state(pool: PgPool) -> AppState {
    init_tracing_once();
    AppState::new(Arc::new(PgStore::from_pool(pool)))
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_pg_booking_conflicts(pool: PgPool) {
    let state = pg_state(pool);
    let provider = register(&state, "tutor").await;
    let first = register(&state, "first").await;
    let second = register(&state, "second").await;
    let listing = publish(&state, &provider, "Calculus tutoring", "tutoring", 20.0).await;
    let day = date!(2025 - 03 - 01);

    let a = book(&state, &first, listing.id, day, "10:00", 2).await.unwrap();
    assert_eq!(a.total_price, 40.0);

    let err = book(&state, &second, listing.id, day, "11:00", 1)
        .await
        .unwrap_err();
    assert_eq!(err.conflicting_booking().map(|b| b.id), Some(a.id));

    book(&state, &second, listing.id, day, "12:00", 1).await.unwrap();

    let thread = BookingService::add_booking_message(state.store(), first.id, a.id, "Hello")
        .await
        .unwrap();
    assert_eq!(thread.messages.len(), 1);
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_pg_concurrent_bookings(pool: PgPool) {
    let state = pg_state(pool);
    let provider = register(&state, "tutor").await;
    let listing = publish(&state, &provider, "Exam cram session", "tutoring", 25.0).await;
    let listing_id = listing.id;

    let mut handles = Vec::new();
    for i in 0..6 {
        let customer = register(&state, &format!("racer{i}")).await;
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            BookingService::create_booking(
                state.store(),
                customer.id,
                booking_request(listing_id, date!(2025 - 03 - 01), "10:00", 1),
            )
            .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(AppError::Conflict { .. }) => {}
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    assert_eq!(succeeded, 1);
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_pg_search_aggregates_and_relevance(pool: PgPool) {
    let state = pg_state(pool);
    let owner = register(&state, "tutor").await;

    let mut strong = listing_request("Calculus tutor", "tutoring", 20.0);
    strong.description = "Calculus and more calculus".to_string();
    let strong = ListingService::create_listing(state.store(), owner.id, strong)
        .await
        .unwrap();
    let mut weak = listing_request("Guitar lessons", "music", 15.0);
    weak.description = "Also happy to chat about calculus".to_string();
    let weak = ListingService::create_listing(state.store(), owner.id, weak)
        .await
        .unwrap();
    publish(&state, &owner, "Laundry pickup", "errands", 12.0).await;

    for (name, rating) in [("amy", 5), ("ben", 4), ("cal", 3)] {
        let customer = register(&state, name).await;
        review(&state, &customer, strong.id, rating).await.unwrap();
    }

    let page = ListingService::search(
        state.store(),
        ListingSearch {
            text: Some("calculus".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].listing.id, strong.id);
    assert_eq!(page.items[0].rating.average_rating, 4.0);
    assert_eq!(page.items[0].rating.reviews_count, 3);
    assert_eq!(page.items[1].listing.id, weak.id);
    assert_eq!(page.items[1].rating.average_rating, 0.0);

    let page = ListingService::search(state.store(), ListingSearch::default())
        .await
        .unwrap();
    assert_eq!(page.total, 3);
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_pg_unique_constraints(pool: PgPool) {
    let state = pg_state(pool);
    let provider = register(&state, "tutor").await;
    let customer = register(&state, "student").await;
    let listing = publish(&state, &provider, "Calculus tutoring", "tutoring", 20.0).await;

    review(&state, &customer, listing.id, 4).await.unwrap();
    let err = review(&state, &customer, listing.id, 5).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let summary =
        ReviewService::review_summary(state.store(), listing.id, ReviewPageQuery::default())
            .await
            .unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.average_rating, 4.0);

    let err = servicehub::services::UserService::register(
        state.store(),
        servicehub::models::RegisterRequest {
            username: "another".to_string(),
            email: "tutor@cs.state.edu".to_string(),
            role: Default::default(),
            major: String::new(),
            grad_year: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::DuplicateKey("email")));
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_pg_soft_delete(pool: PgPool) {
    let state = pg_state(pool);
    let owner = register(&state, "tutor").await;
    let listing = publish(&state, &owner, "Bike repair", "repairs", 30.0).await;

    ListingService::delete_listing(state.store(), owner.id, listing.id)
        .await
        .unwrap();

    let err = ListingService::get_listing(state.store(), listing.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("listing")));

    let page = ListingService::list_own_listings(state.store(), owner.id, 1, 12)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_pg_reschedule_on_deleted_listing(pool: PgPool) {
    let state = pg_state(pool);
    let owner = register(&state, "tutor").await;
    let customer = register(&state, "student").await;
    let listing = publish(&state, &owner, "Bike repair", "repairs", 30.0).await;
    let day = date!(2025 - 03 - 01);
    let booking = book(&state, &customer, listing.id, day, "10:00", 1).await.unwrap();

    ListingService::delete_listing(state.store(), owner.id, listing.id)
        .await
        .unwrap();

    let slot = TimeSlot::new(day, time!(15:00), 1).unwrap();
    let err = state
        .store()
        .reschedule_booking(booking.id, slot, 30.0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("listing")));

    let unchanged = BookingService::get_booking(state.store(), customer.id, booking.id)
        .await
        .unwrap();
    assert_eq!(unchanged.start_time, time!(10:00));

    let err = ReviewService::review_summary(state.store(), listing.id, ReviewPageQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("listing")));
}
