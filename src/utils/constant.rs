//! # Application Constants
//!
//! Paging defaults and input limits used throughout ServiceHub.

/// Page size used when a listing query does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Page size used when a review query does not ask for one.
pub const DEFAULT_REVIEW_PAGE_SIZE: u32 = 10;

/// Upper bound for any requested page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Lower price bound when the search leaves it open.
pub const DEFAULT_PRICE_MIN: f64 = 0.0;

/// Upper price bound when the search leaves it open.
pub const DEFAULT_PRICE_MAX: f64 = 1e9;

/// Longest bookable block, in whole hours.
pub const MAX_BOOKING_HOURS: i32 = 24;

/// Pool size for the Postgres backend when `DATABASE_MAX_CONNECTIONS` is unset.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Longest single message in a booking thread, in characters.
pub const MAX_BOOKING_MESSAGE_LEN: usize = 1000;
