mod booking;
mod listing;
mod page;
mod review;
mod state;
mod user;

pub use booking::{
    Booking, BookingMessage, BookingRequest, BookingRole, BookingStatus, NewBooking,
    RescheduleRequest,
};
pub use listing::{
    Listing, ListingDetails, ListingFilter, ListingOrder, ListingPatch, ListingQuery,
    ListingSearch, ListingStatus, ListingSummary, NewListing, NewListingRequest, RatingStats,
};
pub use page::{Page, PageRequest};
pub use review::{
    NewReview, ResponseRequest, Review, ReviewPageQuery, ReviewRequest, ReviewSummary,
    ReviewUpdate,
};
pub use state::AppState;
pub use user::{NewUser, ProfilePatch, RegisterRequest, User, UserRole};
