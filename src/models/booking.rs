//! # Booking Types
//!
//! Bookings reserve a `[start, start + duration)` block of one calendar day
//! against a listing.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::services::availability::TimeSlot;
use crate::utils::validator::{START_TIME_REGEX, parse_start_time};

time::serde::format_description!(calendar_date, Date, "[year]-[month]-[day]");
time::serde::format_description!(hour_minute, Time, "[hour]:[minute]");

/// Corresponds to the PostgreSQL `booking_status` enum type.
///
/// # Status Flow
///
/// - `Pending` - Requested by the customer, awaiting the provider
/// - `Confirmed` - Accepted by the provider
/// - `Completed` - Service delivered
/// - `Cancelled` - Withdrawn by either party
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        };
        write!(f, "{status_str}")
    }
}

impl BookingStatus {
    /// Returns true if the booking still occupies its time slot.
    /// Cancelled and completed bookings never conflict.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Returns true if `next` is reachable from this status.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }
}

/// One entry of a booking's message thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingMessage {
    pub sender_id: Uuid,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

impl BookingMessage {
    pub fn new(sender_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            sender_id,
            text: text.into(),
            sent_at: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    #[sqlx(rename = "booking_date")]
    #[serde(with = "calendar_date")]
    pub date: Date,
    #[serde(with = "hour_minute")]
    pub start_time: Time,
    pub duration_hours: i32,
    pub status: BookingStatus,
    /// Hourly rate times duration, fixed when the slot was (re)booked.
    pub total_price: f64,
    #[sqlx(json)]
    pub messages: Vec<BookingMessage>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Booking {
    #[inline]
    pub fn slot(&self) -> TimeSlot {
        TimeSlot {
            date: self.date,
            start: self.start_time,
            duration_hours: self.duration_hours,
        }
    }

    #[inline]
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.customer_id == user_id || self.provider_id == user_id
    }
}

/// Request payload for booking a listing.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookingRequest {
    pub listing_id: Uuid,
    #[serde(with = "calendar_date")]
    pub date: Date,
    #[validate(regex(path = "*START_TIME_REGEX"))]
    pub start_time: String,
    #[validate(range(min = 1, max = 24))]
    pub duration_hours: i32,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

impl BookingRequest {
    pub fn slot(&self) -> AppResult<TimeSlot> {
        TimeSlot::new(
            self.date,
            parse_start_time(&self.start_time)?,
            self.duration_hours,
        )
    }
}

/// Request payload for moving a booking to another slot.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RescheduleRequest {
    #[serde(with = "calendar_date")]
    pub date: Date,
    #[validate(regex(path = "*START_TIME_REGEX"))]
    pub start_time: String,
    #[validate(range(min = 1, max = 24))]
    pub duration_hours: i32,
}

impl RescheduleRequest {
    pub fn slot(&self) -> AppResult<TimeSlot> {
        TimeSlot::new(
            self.date,
            parse_start_time(&self.start_time)?,
            self.duration_hours,
        )
    }
}

/// A validated booking ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub listing_id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub slot: TimeSlot,
    pub total_price: f64,
    pub messages: Vec<BookingMessage>,
}

/// Which side of the booking the listed user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingRole {
    Customer,
    Provider,
}
