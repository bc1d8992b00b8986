#![allow(dead_code)]

use std::sync::{Arc, Once};

use servicehub::error::AppResult;
use servicehub::models::{
    AppState, Booking, BookingRequest, Listing, NewListingRequest, RegisterRequest, Review,
    ReviewRequest, User, UserRole,
};
use servicehub::services::{BookingService, ListingService, ReviewService, UserService};
use servicehub::store::MemoryStore;
use time::Date;
use uuid::Uuid;

pub fn init_tracing_once() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("servicehub=debug")
            .with_test_writer()
            .try_init();
    });
}

pub fn memory_state() -> AppState {
    AppState::new(Arc::new(MemoryStore::new()))
}

pub async fn register(state: &AppState, username: &str) -> User {
    register_as(state, username, UserRole::Student).await
}

pub async fn register_as(state: &AppState, username: &str, role: UserRole) -> User {
    UserService::register(
        state.store(),
        RegisterRequest {
            username: username.to_string(),
            email: format!("{username}@cs.state.edu"),
            role,
            major: "Computer Science".to_string(),
            grad_year: Some(2026),
        },
    )
    .await
    .expect("Failed to register test user")
}

pub fn listing_request(title: &str, category: &str, hourly_rate: f64) -> NewListingRequest {
    NewListingRequest {
        title: title.to_string(),
        description: format!("{title} offered by a fellow student"),
        category: category.to_string(),
        hourly_rate,
        location: "Main Campus".to_string(),
        is_emergency: false,
    }
}

pub async fn publish(
    state: &AppState,
    owner: &User,
    title: &str,
    category: &str,
    hourly_rate: f64,
) -> Listing {
    ListingService::create_listing(
        state.store(),
        owner.id,
        listing_request(title, category, hourly_rate),
    )
    .await
    .expect("Failed to publish test listing")
}

pub fn booking_request(
    listing_id: Uuid,
    date: Date,
    start_time: &str,
    duration_hours: i32,
) -> BookingRequest {
    BookingRequest {
        listing_id,
        date,
        start_time: start_time.to_string(),
        duration_hours,
        message: None,
    }
}

pub async fn book(
    state: &AppState,
    customer: &User,
    listing_id: Uuid,
    date: Date,
    start_time: &str,
    duration_hours: i32,
) -> AppResult<Booking> {
    BookingService::create_booking(
        state.store(),
        customer.id,
        booking_request(listing_id, date, start_time, duration_hours),
    )
    .await
}

pub async fn review(
    state: &AppState,
    customer: &User,
    listing_id: Uuid,
    rating: i16,
) -> AppResult<Review> {
    ReviewService::create_review(
        state.store(),
        customer.id,
        ReviewRequest {
            listing_id,
            rating,
            comment: format!("Rated {rating}"),
        },
    )
    .await
}
