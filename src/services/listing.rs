use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    Listing, ListingDetails, ListingFilter, ListingOrder, ListingPatch, ListingQuery,
    ListingSearch, ListingStatus, ListingSummary, NewListing, NewListingRequest, Page,
    PageRequest,
};
use crate::store::Store;

pub struct ListingService;

impl ListingService {
    /// Publishes an active listing owned by `owner_id`.
    #[instrument(skip_all, fields(owner_id = %owner_id))]
    pub async fn create_listing(
        store: &dyn Store,
        owner_id: Uuid,
        request: NewListingRequest,
    ) -> AppResult<Listing> {
        debug!("Processing listing creation");

        let request = request.normalized();
        request.validate().map_err(|e| {
            warn!(error = %e, "Rejected listing payload");
            AppError::from(e)
        })?;

        if store.user_by_id(owner_id).await?.is_none() {
            warn!("Listing owner does not exist");
            return Err(AppError::NotFound("user"));
        }

        let listing = store
            .insert_listing(NewListing {
                owner_id,
                title: request.title,
                description: request.description,
                category: request.category,
                hourly_rate: request.hourly_rate,
                location: request.location,
                is_emergency: request.is_emergency,
            })
            .await?;

        info!(listing_id = %listing.id, "Listing published");
        Ok(listing)
    }

    /// Active listing with rating aggregates and the provider's contact.
    #[instrument(skip_all, fields(listing_id = %id))]
    pub async fn get_listing(store: &dyn Store, id: Uuid) -> AppResult<ListingDetails> {
        let summary = store
            .listing_summary(id)
            .await?
            .ok_or(AppError::NotFound("listing"))?;

        let provider = store
            .user_by_id(summary.listing.owner_id)
            .await?
            .ok_or(AppError::NotFound("user"))?;

        Ok(ListingDetails {
            summary,
            provider_name: provider.username,
            provider_email: provider.email,
        })
    }

    #[instrument(skip_all, fields(actor = %actor, listing_id = %id))]
    pub async fn update_listing(
        store: &dyn Store,
        actor: Uuid,
        id: Uuid,
        patch: ListingPatch,
    ) -> AppResult<Listing> {
        debug!("Processing listing update");

        let patch = patch.normalized();
        patch.validate()?;
        if patch.is_empty() {
            return Err(AppError::validation("no fields to update"));
        }

        Self::owned_active_listing(store, actor, id).await?;

        let listing = store
            .update_listing(id, &patch)
            .await?
            .ok_or(AppError::NotFound("listing"))?;

        info!("Listing updated");
        Ok(listing)
    }

    /// Soft delete. The listing disappears from search, booking and fetch.
    #[instrument(skip_all, fields(actor = %actor, listing_id = %id))]
    pub async fn delete_listing(store: &dyn Store, actor: Uuid, id: Uuid) -> AppResult<()> {
        Self::owned_active_listing(store, actor, id).await?;

        store
            .set_listing_status(id, ListingStatus::Deleted)
            .await?
            .ok_or(AppError::NotFound("listing"))?;

        info!("Listing deleted");
        Ok(())
    }

    /// Browse and full-text search over active listings.
    #[instrument(skip_all)]
    pub async fn search(
        store: &dyn Store,
        search: ListingSearch,
    ) -> AppResult<Page<ListingSummary>> {
        search.validate()?;
        let query = search.into_query();
        debug!(?query.filter, ?query.order, "Processing listing search");

        store.query_listings(&query).await
    }

    /// The owner's active listings, most recently updated first.
    #[instrument(skip_all, fields(owner_id = %owner_id))]
    pub async fn list_own_listings(
        store: &dyn Store,
        owner_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> AppResult<Page<ListingSummary>> {
        let query = ListingQuery {
            filter: ListingFilter::owned_by(owner_id),
            order: ListingOrder::RecentlyUpdated,
            page: PageRequest::new(page, page_size),
        };

        store.query_listings(&query).await
    }

    async fn owned_active_listing(store: &dyn Store, actor: Uuid, id: Uuid) -> AppResult<Listing> {
        let listing = match store.listing_by_id(id).await? {
            Some(listing) if listing.is_active() => listing,
            _ => return Err(AppError::NotFound("listing")),
        };

        if listing.owner_id != actor {
            warn!("Rejected listing change by non-owner");
            return Err(AppError::Ownership("only the owner can modify this listing"));
        }

        Ok(listing)
    }
}
