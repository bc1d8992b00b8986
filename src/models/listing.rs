//! # Listing Types
//!
//! Service listings, their rating aggregates and the typed search query that
//! every listing-returning operation goes through.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::models::PageRequest;
use crate::utils::constant::*;

/// Corresponds to the PostgreSQL `listing_status` enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "listing_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    /// Soft-deleted. Never searched, booked or fetched again.
    Deleted,
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            ListingStatus::Active => "active",
            ListingStatus::Deleted => "deleted",
        };
        write!(f, "{status_str}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub hourly_rate: f64,
    pub location: String,
    pub is_emergency: bool,
    pub status: ListingStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Listing {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }
}

/// Review count and mean rating of one listing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct RatingStats {
    /// Plain mean of all ratings, 0 when there are none.
    pub average_rating: f64,
    pub reviews_count: i64,
}

impl RatingStats {
    /// Aggregates a full set of ratings. Never NaN: no ratings average to 0.
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = i16>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0i64, 0i64), |(sum, count), rating| {
                (sum + i64::from(rating), count + 1)
            });

        let average_rating = if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        };

        Self {
            average_rating,
            reviews_count: count,
        }
    }
}

/// A listing annotated with its rating aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ListingSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub listing: Listing,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub rating: RatingStats,
}

/// Single-listing view with the provider's public contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDetails {
    #[serde(flatten)]
    pub summary: ListingSummary,
    pub provider_name: String,
    pub provider_email: String,
}

/// Request payload for publishing a listing.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewListingRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(length(min = 1, max = 60))]
    pub category: String,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub hourly_rate: f64,
    #[serde(default)]
    #[validate(length(max = 120))]
    pub location: String,
    #[serde(default)]
    pub is_emergency: bool,
}

impl NewListingRequest {
    /// Trims every text field; validation runs on the trimmed values.
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            category: self.category.trim().to_string(),
            location: self.location.trim().to_string(),
            ..self
        }
    }
}

/// Partial update of a listing. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListingPatch {
    #[validate(length(min = 1, max = 120))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub category: Option<String>,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub hourly_rate: Option<f64>,
    #[validate(length(max = 120))]
    pub location: Option<String>,
    pub is_emergency: Option<bool>,
}

impl ListingPatch {
    pub fn normalized(self) -> Self {
        let trim = |field: Option<String>| field.map(|s| s.trim().to_string());
        Self {
            title: trim(self.title),
            description: trim(self.description),
            category: trim(self.category),
            location: trim(self.location),
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.hourly_rate.is_none()
            && self.location.is_none()
            && self.is_emergency.is_none()
    }

    /// Applies the patch in place. Does not touch `updated_at`.
    pub fn apply_to(&self, listing: &mut Listing) {
        if let Some(title) = &self.title {
            listing.title = title.clone();
        }
        if let Some(description) = &self.description {
            listing.description = description.clone();
        }
        if let Some(category) = &self.category {
            listing.category = category.clone();
        }
        if let Some(hourly_rate) = self.hourly_rate {
            listing.hourly_rate = hourly_rate;
        }
        if let Some(location) = &self.location {
            listing.location = location.clone();
        }
        if let Some(is_emergency) = self.is_emergency {
            listing.is_emergency = is_emergency;
        }
    }
}

/// A validated listing ready to be stored.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub hourly_rate: f64,
    pub location: String,
    pub is_emergency: bool,
}

/// Browse/search parameters as they arrive from the routing layer.
///
/// GET /api/listings ?text=tutor&category=math&price_min=10&page=2
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ListingSearch {
    pub text: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    #[validate(range(min = 0.0))]
    pub price_min: Option<f64>,
    #[validate(range(min = 0.0))]
    pub price_max: Option<f64>,
    pub owner_id: Option<Uuid>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}
fn default_page() -> u32 {
    1
}
fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for ListingSearch {
    fn default() -> Self {
        Self {
            text: None,
            category: None,
            location: None,
            price_min: None,
            price_max: None,
            owner_id: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl ListingSearch {
    /// Resolves defaults and picks the ordering: relevance when there is a
    /// text query, newest first otherwise.
    pub fn into_query(self) -> ListingQuery {
        let non_blank = |field: Option<String>| {
            field
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let filter = ListingFilter {
            text: non_blank(self.text),
            category: non_blank(self.category),
            location: non_blank(self.location),
            price_min: self.price_min.unwrap_or(DEFAULT_PRICE_MIN),
            price_max: self.price_max.unwrap_or(DEFAULT_PRICE_MAX),
            owner_id: self.owner_id,
        };

        let order = if filter.text.is_some() {
            ListingOrder::Relevance
        } else {
            ListingOrder::Newest
        };

        ListingQuery {
            filter,
            order,
            page: PageRequest::new(self.page, self.page_size),
        }
    }
}

/// Base filter shared by every listing query. Only active listings ever match.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFilter {
    /// Trimmed, non-empty free text.
    pub text: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub price_min: f64,
    pub price_max: f64,
    pub owner_id: Option<Uuid>,
}

impl ListingFilter {
    /// All active listings of one owner, any price.
    pub fn owned_by(owner_id: Uuid) -> Self {
        Self {
            text: None,
            category: None,
            location: None,
            price_min: DEFAULT_PRICE_MIN,
            price_max: DEFAULT_PRICE_MAX,
            owner_id: Some(owner_id),
        }
    }

    /// Structured part of the filter, everything except the text match.
    pub fn matches(&self, listing: &Listing) -> bool {
        listing.is_active()
            && listing.hourly_rate >= self.price_min
            && listing.hourly_rate <= self.price_max
            && self
                .category
                .as_ref()
                .is_none_or(|category| &listing.category == category)
            && self
                .location
                .as_ref()
                .is_none_or(|location| &listing.location == location)
            && self.owner_id.is_none_or(|owner| listing.owner_id == owner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOrder {
    /// Descending text relevance, newest first on ties.
    Relevance,
    /// Descending creation time, then descending update time.
    Newest,
    /// Descending update time, then descending creation time.
    RecentlyUpdated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub filter: ListingFilter,
    pub order: ListingOrder,
    pub page: PageRequest,
}
