//! # Availability / Conflict Checker
//!
//! A booking occupies the half-open interval `[start, start + duration)` of
//! its calendar day. Two bookings of the same listing conflict when both are
//! active (pending or confirmed), fall on the same date, and their intervals
//! overlap. Touching endpoints do not overlap.
//!
//! The end is computed by adding whole hours to the start without rolling
//! into the next day, so a late booking is only compared against bookings of
//! its own date.
//!
//! [`find_conflict`] is the single overlap routine. Both storage backends call
//! it inside their atomic insert, and [`AvailabilityService::check_conflict`]
//! calls it for read-only checks.

use serde::Serialize;
use time::{Date, Time};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Booking;
use crate::store::Store;
use crate::utils::constant::MAX_BOOKING_HOURS;
use crate::utils::validator::{parse_id, parse_start_time};

/// A requested or occupied block of whole hours on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub date: Date,
    pub start: Time,
    pub duration_hours: i32,
}

impl TimeSlot {
    /// # Errors
    ///
    /// Zero, negative, or over-long durations are rejected here, before any
    /// conflict check runs.
    pub fn new(date: Date, start: Time, duration_hours: i32) -> AppResult<Self> {
        if duration_hours <= 0 {
            warn!(duration_hours, "Rejected non-positive booking duration");
            return Err(AppError::validation("duration must be a positive number of hours"));
        }
        if duration_hours > MAX_BOOKING_HOURS {
            warn!(duration_hours, "Rejected over-long booking duration");
            return Err(AppError::validation(format!(
                "duration cannot exceed {MAX_BOOKING_HOURS} hours"
            )));
        }

        Ok(Self {
            date,
            start,
            duration_hours,
        })
    }

    /// Minutes after midnight at which the slot starts.
    #[inline]
    pub fn start_minute(&self) -> i32 {
        i32::from(self.start.hour()) * 60 + i32::from(self.start.minute())
    }

    /// Minutes after midnight at which the slot ends (exclusive). May exceed
    /// 24 hours; the slot never spills into the next date.
    #[inline]
    pub fn end_minute(&self) -> i32 {
        self.start_minute() + self.duration_hours * 60
    }

    /// `s1 < e2 && e1 > s2` on the same date.
    #[inline]
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.date == other.date
            && self.start_minute() < other.end_minute()
            && self.end_minute() > other.start_minute()
    }
}

/// Returns the first active booking whose slot overlaps `slot`.
///
/// Cancelled and completed bookings are skipped, as is `exclude` (the
/// booking being rescheduled). Callers pass bookings of a single listing.
pub fn find_conflict<'a, I>(slot: &TimeSlot, bookings: I, exclude: Option<Uuid>) -> Option<&'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings.into_iter().find(|booking| {
        booking.status.is_active()
            && exclude != Some(booking.id)
            && booking.slot().overlaps(slot)
    })
}

/// Outcome of a conflict check. Nothing is reserved by asking.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictCheck {
    pub has_conflict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_booking: Option<Booking>,
}

/// Conflict check as it arrives from the routing layer, identifiers unparsed.
#[derive(Debug, Clone)]
pub struct ConflictRequest {
    pub listing_id: String,
    pub date: Date,
    /// "HH:MM", 24-hour
    pub start_time: String,
    pub duration_hours: i32,
    pub exclude_booking_id: Option<String>,
}

pub struct AvailabilityService;

impl AvailabilityService {
    /// Parses a raw request and runs [`Self::check_conflict`].
    ///
    /// # Errors
    ///
    /// - [`AppError::Uuid`] for a malformed listing or booking id
    /// - [`AppError::Validation`] for a bad start time or duration
    pub async fn check_request(
        store: &dyn Store,
        request: &ConflictRequest,
    ) -> AppResult<ConflictCheck> {
        let listing_id = parse_id(&request.listing_id)?;
        let exclude_booking_id = request
            .exclude_booking_id
            .as_deref()
            .map(parse_id)
            .transpose()?;
        let slot = TimeSlot::new(
            request.date,
            parse_start_time(&request.start_time)?,
            request.duration_hours,
        )?;

        Self::check_conflict(store, listing_id, &slot, exclude_booking_id).await
    }

    /// Checks whether `slot` is free on the listing.
    ///
    /// This is advisory: the slot can be taken between the check and a later
    /// booking attempt. [`BookingService::create_booking`] repeats the check
    /// atomically with the insert.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if the listing is absent or deleted
    ///
    /// [`BookingService::create_booking`]: crate::services::BookingService::create_booking
    #[instrument(skip_all, fields(listing_id = %listing_id, date = %slot.date))]
    pub async fn check_conflict(
        store: &dyn Store,
        listing_id: Uuid,
        slot: &TimeSlot,
        exclude_booking_id: Option<Uuid>,
    ) -> AppResult<ConflictCheck> {
        debug!("Processing conflict check");

        match store.listing_by_id(listing_id).await? {
            Some(listing) if listing.is_active() => {}
            _ => {
                warn!("Conflict check against missing or deleted listing");
                return Err(AppError::NotFound("listing"));
            }
        }

        let bookings = store
            .active_bookings_on(listing_id, slot.date, exclude_booking_id)
            .await?;

        let conflicting_booking = find_conflict(slot, &bookings, exclude_booking_id).cloned();

        debug!(
            candidates = bookings.len(),
            has_conflict = conflicting_booking.is_some(),
            "Conflict check finished"
        );

        Ok(ConflictCheck {
            has_conflict: conflicting_booking.is_some(),
            conflicting_booking,
        })
    }
}
