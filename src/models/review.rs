use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::models::PageRequest;
use crate::utils::constant::DEFAULT_REVIEW_PAGE_SIZE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    /// Between 1 and 5
    pub rating: i16,
    pub comment: String,
    /// Set at most once, by the listing's provider.
    pub provider_response: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Request payload for reviewing a listing.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewRequest {
    pub listing_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub comment: String,
}

/// Request payload for editing one's own review.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewUpdate {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub comment: String,
}

/// Request payload for the provider's single response.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResponseRequest {
    #[validate(length(min = 1, max = 2000))]
    pub response: String,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub listing_id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub rating: i16,
    pub comment: String,
}

/// Newest-first page of a listing's reviews with the average over all of them.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub reviews: Vec<Review>,
    pub total: u64,
    /// Mean over every review of the listing, not just this page.
    pub average_rating: f64,
    pub page: u32,
    pub page_size: u32,
}

/// Paging for review lists. Defaults to the first page of ten.
///
/// GET /api/listings/{id}/reviews ?page=2&page_size=5
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReviewPageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}
fn default_page() -> u32 {
    1
}
fn default_page_size() -> u32 {
    DEFAULT_REVIEW_PAGE_SIZE
}

impl Default for ReviewPageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl ReviewPageQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    #[inline]
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}
