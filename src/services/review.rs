use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    NewReview, Page, ResponseRequest, Review, ReviewPageQuery, ReviewRequest, ReviewSummary,
    ReviewUpdate,
};
use crate::store::Store;

pub struct ReviewService;

impl ReviewService {
    /// Records one review per customer and listing.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if the listing is absent or deleted
    /// - [`AppError::Ownership`] if the customer owns the listing
    /// - [`AppError::Conflict`] if the customer already reviewed it
    #[instrument(skip_all, fields(customer_id = %customer_id, listing_id = %request.listing_id))]
    pub async fn create_review(
        store: &dyn Store,
        customer_id: Uuid,
        request: ReviewRequest,
    ) -> AppResult<Review> {
        debug!("Processing review");
        request.validate()?;

        let listing = match store.listing_by_id(request.listing_id).await? {
            Some(listing) if listing.is_active() => listing,
            _ => return Err(AppError::NotFound("listing")),
        };
        if listing.owner_id == customer_id {
            warn!("Rejected self-review");
            return Err(AppError::Ownership("cannot review your own listing"));
        }

        let review = store
            .insert_review(NewReview {
                listing_id: listing.id,
                customer_id,
                provider_id: listing.owner_id,
                rating: request.rating,
                comment: request.comment.trim().to_string(),
            })
            .await
            .inspect_err(|e| {
                if matches!(e, AppError::Conflict { .. }) {
                    warn!("Duplicate review rejected");
                }
            })?;

        info!(review_id = %review.id, rating = review.rating, "Review created");
        Ok(review)
    }

    #[instrument(skip_all, fields(actor = %actor, review_id = %review_id))]
    pub async fn update_review(
        store: &dyn Store,
        actor: Uuid,
        review_id: Uuid,
        request: ReviewUpdate,
    ) -> AppResult<Review> {
        request.validate()?;

        let review = store
            .review_by_id(review_id)
            .await?
            .ok_or(AppError::NotFound("review"))?;
        if review.customer_id != actor {
            warn!("Rejected review edit by non-author");
            return Err(AppError::Ownership("only the author can edit this review"));
        }

        let updated = store
            .update_review(review_id, request.rating, request.comment.trim())
            .await?
            .ok_or(AppError::NotFound("review"))?;

        info!("Review updated");
        Ok(updated)
    }

    /// Attaches the provider's single response.
    #[instrument(skip_all, fields(actor = %actor, review_id = %review_id))]
    pub async fn respond_to_review(
        store: &dyn Store,
        actor: Uuid,
        review_id: Uuid,
        request: ResponseRequest,
    ) -> AppResult<Review> {
        let request = ResponseRequest {
            response: request.response.trim().to_string(),
        };
        request.validate()?;

        let review = store
            .review_by_id(review_id)
            .await?
            .ok_or(AppError::NotFound("review"))?;
        if review.provider_id != actor {
            warn!("Rejected response by non-provider");
            return Err(AppError::Ownership("only the provider can respond"));
        }
        if review.provider_response.is_some() {
            return Err(AppError::conflict("review already has a response"));
        }

        let updated = store
            .set_review_response(review_id, &request.response)
            .await?
            .ok_or_else(|| AppError::conflict("review already has a response"))?;

        info!("Provider responded to review");
        Ok(updated)
    }

    /// A page of the listing's reviews, newest first, with the average over
    /// all of them.
    #[instrument(skip_all, fields(listing_id = %listing_id))]
    pub async fn review_summary(
        store: &dyn Store,
        listing_id: Uuid,
        query: ReviewPageQuery,
    ) -> AppResult<ReviewSummary> {
        match store.listing_by_id(listing_id).await? {
            Some(listing) if listing.is_active() => {}
            _ => return Err(AppError::NotFound("listing")),
        }
        let page = query.page_request();

        let reviews = store.reviews_for_listing(listing_id, page).await?;
        let stats = store.listing_rating(listing_id).await?;

        Ok(ReviewSummary {
            reviews: reviews.items,
            total: reviews.total,
            average_rating: stats.average_rating,
            page: reviews.page,
            page_size: reviews.page_size,
        })
    }

    /// Reviews received across all of the provider's listings, newest first.
    #[instrument(skip_all, fields(provider_id = %provider_id))]
    pub async fn provider_reviews(
        store: &dyn Store,
        provider_id: Uuid,
        query: ReviewPageQuery,
    ) -> AppResult<Page<Review>> {
        store
            .reviews_for_provider(provider_id, query.page_request())
            .await
    }
}
