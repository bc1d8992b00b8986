//! In-process store backed by concurrent maps.
//!
//! Bookings and reviews are bucketed per listing. Holding a bucket's map
//! entry holds the shard write lock, so check-then-insert inside one entry is
//! atomic with respect to every other writer of that listing. Listing status
//! changes take the same entry, so a deleted listing never gains a booking.
//!
//! Text search matches exact lower-cased alphanumeric tokens. There is no
//! stemming or stopword removal, unlike the Postgres backend: "tutor" does not
//! match "tutoring" here, and "the" matches any listing containing it.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use time::{Date, Duration, OffsetDateTime};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::Store;
use crate::error::{AppError, AppResult};
use crate::models::{
    Booking, BookingMessage, BookingRole, BookingStatus, Listing, ListingOrder, ListingPatch,
    ListingQuery, ListingStatus, ListingSummary, NewBooking, NewListing, NewReview, NewUser,
    Page, PageRequest, ProfilePatch, RatingStats, Review, User,
};
use crate::services::availability::{TimeSlot, find_conflict};

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    /// Serializes registrations and username changes so uniqueness holds.
    identity_lock: Mutex<()>,
    listings: DashMap<Uuid, Listing>,
    /// Bookings keyed by listing id.
    bookings: DashMap<Uuid, Vec<Booking>>,
    /// Reviews keyed by listing id.
    reviews: DashMap<Uuid, Vec<Review>>,
    /// Last timestamp handed out, keeps recency ordering strict.
    clock: Mutex<Option<OffsetDateTime>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        info!("Opening in-memory store");
        Self::default()
    }

    /// Strictly increasing wall-clock time.
    fn now(&self) -> OffsetDateTime {
        let mut last = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = match *last {
            Some(prev) if prev >= OffsetDateTime::now_utc() => prev + Duration::microseconds(1),
            _ => OffsetDateTime::now_utc(),
        };
        *last = Some(now);
        now
    }

    fn rating_of(&self, listing_id: Uuid) -> RatingStats {
        self.reviews
            .get(&listing_id)
            .map(|reviews| RatingStats::from_ratings(reviews.iter().map(|r| r.rating)))
            .unwrap_or_default()
    }

    fn summarize(&self, listing: Listing) -> ListingSummary {
        let rating = self.rating_of(listing.id);
        ListingSummary { listing, rating }
    }

    /// Listing bucket that holds the booking. Must not be called while an
    /// entry of `bookings` is held.
    fn booking_bucket(&self, booking_id: Uuid) -> Option<Uuid> {
        self.bookings.iter().find_map(|bucket| {
            bucket
                .value()
                .iter()
                .any(|b| b.id == booking_id)
                .then(|| *bucket.key())
        })
    }

    /// Callers hold the listing's `bookings` entry, so a concurrent status
    /// change cannot land between this check and their write.
    fn listing_is_active(&self, listing_id: Uuid) -> bool {
        self.listings
            .get(&listing_id)
            .is_some_and(|l| l.is_active())
    }

    fn review_bucket(&self, review_id: Uuid) -> Option<Uuid> {
        self.reviews.iter().find_map(|bucket| {
            bucket
                .value()
                .iter()
                .any(|r| r.id == review_id)
                .then(|| *bucket.key())
        })
    }

    /// Applies `update` to the booking under its bucket lock. The closure
    /// returns false to leave the booking untouched.
    fn modify_booking<F>(&self, booking_id: Uuid, update: F) -> Option<Booking>
    where
        F: FnOnce(&mut Booking) -> bool,
    {
        let listing_id = self.booking_bucket(booking_id)?;
        let now = self.now();
        let mut bucket = self.bookings.get_mut(&listing_id)?;
        let booking = bucket.iter_mut().find(|b| b.id == booking_id)?;
        if !update(&mut *booking) {
            return None;
        }
        booking.updated_at = now;
        Some(booking.clone())
    }

    fn modify_review<F>(&self, review_id: Uuid, update: F) -> Option<Review>
    where
        F: FnOnce(&mut Review) -> bool,
    {
        let listing_id = self.review_bucket(review_id)?;
        let mut bucket = self.reviews.get_mut(&listing_id)?;
        let review = bucket.iter_mut().find(|r| r.id == review_id)?;
        if !update(&mut *review) {
            return None;
        }
        Some(review.clone())
    }

    fn identity_guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.identity_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lower-cased alphanumeric tokens.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

/// Summed frequency of the query terms in title and description. Any term
/// matching is enough, 0 means no match.
fn relevance(listing: &Listing, terms: &HashSet<String>) -> f64 {
    tokenize(&listing.title)
        .chain(tokenize(&listing.description))
        .filter(|token| terms.contains(token))
        .count() as f64
}

fn sort_summaries(scored: &mut [(f64, ListingSummary)], order: ListingOrder) {
    scored.sort_by(|(score_a, a), (score_b, b)| {
        let (a, b) = (&a.listing, &b.listing);
        match order {
            ListingOrder::Relevance => score_b
                .total_cmp(score_a)
                .then_with(|| b.created_at.cmp(&a.created_at)),
            ListingOrder::Newest => b
                .created_at
                .cmp(&a.created_at)
                .then_with(|| b.updated_at.cmp(&a.updated_at)),
            ListingOrder::RecentlyUpdated => b
                .updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at)),
        }
    });
}

fn newest_reviews_first(reviews: &mut [Review]) {
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl Store for MemoryStore {
    #[instrument(skip_all)]
    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        let _guard = self.identity_guard();

        if self.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::DuplicateKey("email"));
        }
        if self.users.iter().any(|u| u.username == user.username) {
            return Err(AppError::DuplicateKey("username"));
        }

        let now = self.now();
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            role: user.role,
            major: user.major,
            grad_year: user.grad_year,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        debug!(user_id = %user.id, "Stored user");
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.value().clone()))
    }

    async fn update_user(&self, id: Uuid, patch: &ProfilePatch) -> AppResult<Option<User>> {
        let _guard = self.identity_guard();

        if let Some(username) = &patch.username
            && self
                .users
                .iter()
                .any(|u| u.id != id && &u.username == username)
        {
            return Err(AppError::DuplicateKey("username"));
        }

        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = &patch.username {
            user.username = username.clone();
        }
        if let Some(major) = &patch.major {
            user.major = major.clone();
        }
        if let Some(grad_year) = patch.grad_year {
            user.grad_year = Some(grad_year);
        }
        user.updated_at = self.now();
        Ok(Some(user.value().clone()))
    }

    async fn insert_listing(&self, listing: NewListing) -> AppResult<Listing> {
        let now = self.now();
        let listing = Listing {
            id: Uuid::new_v4(),
            owner_id: listing.owner_id,
            title: listing.title,
            description: listing.description,
            category: listing.category,
            hourly_rate: listing.hourly_rate,
            location: listing.location,
            is_emergency: listing.is_emergency,
            status: ListingStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.listings.insert(listing.id, listing.clone());
        Ok(listing)
    }

    async fn listing_by_id(&self, id: Uuid) -> AppResult<Option<Listing>> {
        Ok(self.listings.get(&id).map(|l| l.value().clone()))
    }

    async fn listing_summary(&self, id: Uuid) -> AppResult<Option<ListingSummary>> {
        let listing = self
            .listings
            .get(&id)
            .filter(|l| l.is_active())
            .map(|l| l.value().clone());
        Ok(listing.map(|l| self.summarize(l)))
    }

    async fn update_listing(&self, id: Uuid, patch: &ListingPatch) -> AppResult<Option<Listing>> {
        let Some(mut listing) = self.listings.get_mut(&id) else {
            return Ok(None);
        };
        if !listing.is_active() {
            return Ok(None);
        }
        patch.apply_to(listing.value_mut());
        listing.updated_at = self.now();
        Ok(Some(listing.value().clone()))
    }

    async fn set_listing_status(
        &self,
        id: Uuid,
        status: ListingStatus,
    ) -> AppResult<Option<Listing>> {
        if !self.listings.contains_key(&id) {
            return Ok(None);
        }
        // Held so status changes serialize with booking writes on the listing.
        let _bucket = self.bookings.entry(id).or_default();
        let Some(mut listing) = self.listings.get_mut(&id) else {
            return Ok(None);
        };
        listing.status = status;
        listing.updated_at = self.now();
        Ok(Some(listing.value().clone()))
    }

    #[instrument(skip_all, fields(order = ?query.order, page = query.page.page))]
    async fn query_listings(&self, query: &ListingQuery) -> AppResult<Page<ListingSummary>> {
        let filter = &query.filter;
        let terms: Option<HashSet<String>> = filter.text.as_deref().map(|t| tokenize(t).collect());

        let candidates: Vec<(f64, Listing)> = self
            .listings
            .iter()
            .filter(|l| filter.matches(l.value()))
            .filter_map(|l| {
                let score = match &terms {
                    Some(terms) => relevance(l.value(), terms),
                    None => 0.0,
                };
                if terms.is_some() && score == 0.0 {
                    return None;
                }
                Some((score, l.value().clone()))
            })
            .collect();

        let mut scored: Vec<(f64, ListingSummary)> = candidates
            .into_iter()
            .map(|(score, listing)| (score, self.summarize(listing)))
            .collect();
        sort_summaries(&mut scored, query.order);

        debug!(matches = scored.len(), "Listing query evaluated");
        Ok(query
            .page
            .slice(scored.into_iter().map(|(_, summary)| summary).collect()))
    }

    async fn active_bookings_on(
        &self,
        listing_id: Uuid,
        date: Date,
        exclude: Option<Uuid>,
    ) -> AppResult<Vec<Booking>> {
        Ok(self
            .bookings
            .get(&listing_id)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|b| b.status.is_active() && b.date == date && Some(b.id) != exclude)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    #[instrument(skip_all, fields(listing_id = %booking.listing_id))]
    async fn insert_booking(&self, booking: NewBooking) -> AppResult<Booking> {
        let mut bucket = self.bookings.entry(booking.listing_id).or_default();
        if !self.listing_is_active(booking.listing_id) {
            return Err(AppError::NotFound("listing"));
        }
        if let Some(conflict) = find_conflict(&booking.slot, bucket.iter(), None) {
            return Err(AppError::booking_conflict(conflict.clone()));
        }

        let now = self.now();
        let booking = Booking {
            id: Uuid::new_v4(),
            listing_id: booking.listing_id,
            customer_id: booking.customer_id,
            provider_id: booking.provider_id,
            date: booking.slot.date,
            start_time: booking.slot.start,
            duration_hours: booking.slot.duration_hours,
            status: BookingStatus::Pending,
            total_price: booking.total_price,
            messages: booking.messages,
            created_at: now,
            updated_at: now,
        };
        bucket.push(booking.clone());
        Ok(booking)
    }

    #[instrument(skip_all, fields(booking_id = %id))]
    async fn reschedule_booking(
        &self,
        id: Uuid,
        slot: TimeSlot,
        total_price: f64,
    ) -> AppResult<Option<Booking>> {
        let Some(listing_id) = self.booking_bucket(id) else {
            return Ok(None);
        };

        let mut bucket = self.bookings.entry(listing_id).or_default();
        if !self.listing_is_active(listing_id) {
            return Err(AppError::NotFound("listing"));
        }
        let Some(index) = bucket
            .iter()
            .position(|b| b.id == id && b.status.is_active())
        else {
            return Ok(None);
        };
        if let Some(conflict) = find_conflict(&slot, bucket.iter(), Some(id)) {
            return Err(AppError::booking_conflict(conflict.clone()));
        }

        let booking = &mut bucket[index];
        booking.date = slot.date;
        booking.start_time = slot.start;
        booking.duration_hours = slot.duration_hours;
        booking.total_price = total_price;
        booking.status = BookingStatus::Pending;
        booking.updated_at = self.now();
        Ok(Some(booking.clone()))
    }

    async fn booking_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        Ok(self
            .bookings
            .iter()
            .find_map(|bucket| bucket.value().iter().find(|b| b.id == id).cloned()))
    }

    async fn set_booking_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> AppResult<Option<Booking>> {
        Ok(self.modify_booking(id, |booking| {
            if booking.status != from {
                return false;
            }
            booking.status = to;
            true
        }))
    }

    async fn push_booking_message(
        &self,
        id: Uuid,
        message: BookingMessage,
    ) -> AppResult<Option<Booking>> {
        Ok(self.modify_booking(id, |booking| {
            booking.messages.push(message);
            true
        }))
    }

    async fn bookings_for_user(
        &self,
        user_id: Uuid,
        role: BookingRole,
    ) -> AppResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .flat_map(|bucket| {
                bucket
                    .value()
                    .iter()
                    .filter(|b| match role {
                        BookingRole::Customer => b.customer_id == user_id,
                        BookingRole::Provider => b.provider_id == user_id,
                    })
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        bookings.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.start_time.cmp(&a.start_time))
        });
        Ok(bookings)
    }

    #[instrument(skip_all, fields(listing_id = %review.listing_id))]
    async fn insert_review(&self, review: NewReview) -> AppResult<Review> {
        let mut bucket = self.reviews.entry(review.listing_id).or_default();
        if bucket.iter().any(|r| r.customer_id == review.customer_id) {
            return Err(AppError::conflict("listing already reviewed by this customer"));
        }

        let review = Review {
            id: Uuid::new_v4(),
            listing_id: review.listing_id,
            customer_id: review.customer_id,
            provider_id: review.provider_id,
            rating: review.rating,
            comment: review.comment,
            provider_response: None,
            created_at: self.now(),
        };
        bucket.push(review.clone());
        Ok(review)
    }

    async fn review_by_id(&self, id: Uuid) -> AppResult<Option<Review>> {
        Ok(self
            .reviews
            .iter()
            .find_map(|bucket| bucket.value().iter().find(|r| r.id == id).cloned()))
    }

    async fn update_review(
        &self,
        id: Uuid,
        rating: i16,
        comment: &str,
    ) -> AppResult<Option<Review>> {
        Ok(self.modify_review(id, |review| {
            review.rating = rating;
            review.comment = comment.to_string();
            true
        }))
    }

    async fn set_review_response(&self, id: Uuid, response: &str) -> AppResult<Option<Review>> {
        Ok(self.modify_review(id, |review| {
            if review.provider_response.is_some() {
                return false;
            }
            review.provider_response = Some(response.to_string());
            true
        }))
    }

    async fn reviews_for_listing(
        &self,
        listing_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Review>> {
        let mut reviews = self
            .reviews
            .get(&listing_id)
            .map(|bucket| bucket.value().clone())
            .unwrap_or_default();
        newest_reviews_first(&mut reviews);
        Ok(page.slice(reviews))
    }

    async fn listing_rating(&self, listing_id: Uuid) -> AppResult<RatingStats> {
        Ok(self.rating_of(listing_id))
    }

    async fn reviews_for_provider(
        &self,
        provider_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Review>> {
        let mut reviews: Vec<Review> = self
            .reviews
            .iter()
            .flat_map(|bucket| {
                bucket
                    .value()
                    .iter()
                    .filter(|r| r.provider_id == provider_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        newest_reviews_first(&mut reviews);
        Ok(page.slice(reviews))
    }

    async fn close(&self) {
        info!("Closing in-memory store");
    }
}
