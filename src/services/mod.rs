//! # Business Logic Services
//!
//! Services validate input, check ownership and delegate persistence to the
//! [`Store`](crate::store::Store) passed in by the caller. They hold no state.
//!
//! ## Available Services
//!
//! - **Availability** (`availability`) - Booking overlap detection
//! - **Listing** (`listing`) - Listing lifecycle, search and rating aggregates
//! - **Booking** (`booking`) - Conflict-free booking and its message thread
//! - **Review** (`review`) - Reviews, provider responses and summaries
//! - **User** (`user`) - Registration and profiles

pub mod availability;
mod booking;
mod listing;
mod review;
mod user;

pub use availability::{AvailabilityService, ConflictCheck, ConflictRequest, TimeSlot};
pub use booking::BookingService;
pub use listing::ListingService;
pub use review::ReviewService;
pub use user::UserService;
