//! # Persistence
//!
//! The [`Store`] trait is the only way the services touch data. It exposes the
//! filter/sort/paginate/aggregate primitives the services need, plus the
//! atomic conditional writes that keep bookings and reviews consistent under
//! concurrent callers.
//!
//! ## Implementations
//!
//! - [`PgStore`] - PostgreSQL via `sqlx`
//! - [`MemoryStore`] - In-process maps for development and tests

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use time::Date;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Booking, BookingMessage, BookingRole, BookingStatus, Listing, ListingPatch, ListingQuery,
    ListingStatus, ListingSummary, NewBooking, NewListing, NewReview, NewUser, Page,
    PageRequest, ProfilePatch, RatingStats, Review, User,
};
use crate::services::availability::TimeSlot;

#[async_trait]
pub trait Store: Send + Sync {
    // Users

    /// # Errors
    ///
    /// [`AppError::DuplicateKey`] naming `email` or `username` when taken.
    ///
    /// [`AppError::DuplicateKey`]: crate::error::AppError::DuplicateKey
    async fn insert_user(&self, user: NewUser) -> AppResult<User>;

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// `email` must already be lower-cased.
    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn update_user(&self, id: Uuid, patch: &ProfilePatch) -> AppResult<Option<User>>;

    // Listings

    async fn insert_listing(&self, listing: NewListing) -> AppResult<Listing>;

    /// Raw lookup, deleted listings included.
    async fn listing_by_id(&self, id: Uuid) -> AppResult<Option<Listing>>;

    /// Active listing with its rating aggregates.
    async fn listing_summary(&self, id: Uuid) -> AppResult<Option<ListingSummary>>;

    /// Applies `patch` to an active listing and bumps `updated_at`.
    async fn update_listing(&self, id: Uuid, patch: &ListingPatch) -> AppResult<Option<Listing>>;

    async fn set_listing_status(
        &self,
        id: Uuid,
        status: ListingStatus,
    ) -> AppResult<Option<Listing>>;

    /// Filters, aggregates, orders and paginates active listings. `total`
    /// counts every match regardless of the page.
    async fn query_listings(&self, query: &ListingQuery) -> AppResult<Page<ListingSummary>>;

    // Bookings

    /// Pending and confirmed bookings of one listing on one date.
    async fn active_bookings_on(
        &self,
        listing_id: Uuid,
        date: Date,
        exclude: Option<Uuid>,
    ) -> AppResult<Vec<Booking>>;

    /// Inserts a pending booking if its slot is free, atomically with the
    /// conflict check.
    ///
    /// # Errors
    ///
    /// - `Conflict` carrying the overlapping booking
    /// - `NotFound` if the listing is absent or deleted
    async fn insert_booking(&self, booking: NewBooking) -> AppResult<Booking>;

    /// Moves an active booking to `slot`, resets it to pending and stores the
    /// new price, atomically with a conflict check that ignores the booking
    /// itself. `Ok(None)` when the booking is missing or no longer active.
    async fn reschedule_booking(
        &self,
        id: Uuid,
        slot: TimeSlot,
        total_price: f64,
    ) -> AppResult<Option<Booking>>;

    async fn booking_by_id(&self, id: Uuid) -> AppResult<Option<Booking>>;

    /// Compare-and-set on the status. `Ok(None)` when the booking is missing
    /// or its status is no longer `from`.
    async fn set_booking_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> AppResult<Option<Booking>>;

    async fn push_booking_message(
        &self,
        id: Uuid,
        message: BookingMessage,
    ) -> AppResult<Option<Booking>>;

    /// Newest date first, then latest start.
    async fn bookings_for_user(&self, user_id: Uuid, role: BookingRole)
    -> AppResult<Vec<Booking>>;

    // Reviews

    /// # Errors
    ///
    /// `Conflict` when the customer already reviewed the listing.
    async fn insert_review(&self, review: NewReview) -> AppResult<Review>;

    async fn review_by_id(&self, id: Uuid) -> AppResult<Option<Review>>;

    async fn update_review(&self, id: Uuid, rating: i16, comment: &str)
    -> AppResult<Option<Review>>;

    /// Sets the provider response only if none exists yet. `Ok(None)` when
    /// the review is missing or already answered.
    async fn set_review_response(&self, id: Uuid, response: &str) -> AppResult<Option<Review>>;

    /// Newest first.
    async fn reviews_for_listing(
        &self,
        listing_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Review>>;

    /// Aggregates over every review of the listing.
    async fn listing_rating(&self, listing_id: Uuid) -> AppResult<RatingStats>;

    /// Newest first.
    async fn reviews_for_provider(
        &self,
        provider_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Review>>;

    // Lifecycle

    async fn close(&self);
}
