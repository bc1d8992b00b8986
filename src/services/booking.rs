use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    Booking, BookingMessage, BookingRequest, BookingRole, BookingStatus, NewBooking,
    RescheduleRequest,
};
use crate::store::Store;
use crate::utils::constant::MAX_BOOKING_MESSAGE_LEN;

pub struct BookingService;

impl BookingService {
    /// Books a slot on an active listing for `customer_id`.
    ///
    /// The price is the listing's hourly rate times the duration. The
    /// conflict check runs inside the store's atomic insert, so two
    /// overlapping requests can never both succeed.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for a bad start time, duration or message
    /// - [`AppError::NotFound`] if the listing is absent or deleted
    /// - [`AppError::Conflict`] carrying the overlapping booking
    #[instrument(skip_all, fields(customer_id = %customer_id, listing_id = %request.listing_id))]
    pub async fn create_booking(
        store: &dyn Store,
        customer_id: Uuid,
        request: BookingRequest,
    ) -> AppResult<Booking> {
        debug!("Processing booking request");

        request.validate().map_err(|e| {
            warn!(error = %e, "Rejected booking payload");
            AppError::from(e)
        })?;
        let slot = request.slot()?;

        let listing = match store.listing_by_id(request.listing_id).await? {
            Some(listing) if listing.is_active() => listing,
            _ => {
                warn!("Booking against missing or deleted listing");
                return Err(AppError::NotFound("listing"));
            }
        };

        let messages = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| vec![BookingMessage::new(customer_id, text)])
            .unwrap_or_default();

        let booking = store
            .insert_booking(NewBooking {
                listing_id: listing.id,
                customer_id,
                provider_id: listing.owner_id,
                slot,
                total_price: listing.hourly_rate * f64::from(slot.duration_hours),
                messages,
            })
            .await
            .inspect_err(|e| {
                if let Some(existing) = e.conflicting_booking() {
                    warn!(conflicting_booking = %existing.id, "Requested slot already taken");
                }
            })?;

        info!(booking_id = %booking.id, total_price = booking.total_price, "Booking created");
        Ok(booking)
    }

    /// Moves a booking to another slot. Only the customer may reschedule,
    /// and only while the booking is pending or confirmed. A confirmed
    /// booking goes back to pending.
    #[instrument(skip_all, fields(actor = %actor, booking_id = %booking_id))]
    pub async fn reschedule_booking(
        store: &dyn Store,
        actor: Uuid,
        booking_id: Uuid,
        request: RescheduleRequest,
    ) -> AppResult<Booking> {
        request.validate()?;
        let slot = request.slot()?;

        let booking = store
            .booking_by_id(booking_id)
            .await?
            .ok_or(AppError::NotFound("booking"))?;

        if booking.customer_id != actor {
            warn!("Rejected reschedule by non-customer");
            return Err(AppError::Ownership("only the customer can reschedule"));
        }
        if !booking.status.is_active() {
            return Err(AppError::validation(format!(
                "cannot reschedule a {} booking",
                booking.status
            )));
        }

        let listing = match store.listing_by_id(booking.listing_id).await? {
            Some(listing) if listing.is_active() => listing,
            _ => return Err(AppError::NotFound("listing")),
        };
        let total_price = listing.hourly_rate * f64::from(slot.duration_hours);

        let updated = store
            .reschedule_booking(booking_id, slot, total_price)
            .await?
            .ok_or_else(|| AppError::conflict("booking changed while rescheduling"))?;

        info!(date = %updated.date, "Booking rescheduled");
        Ok(updated)
    }

    /// Applies a status transition.
    ///
    /// - pending -> confirmed, confirmed -> completed: provider
    /// - pending | confirmed -> cancelled: customer or provider
    #[instrument(skip_all, fields(actor = %actor, booking_id = %booking_id, next = %next))]
    pub async fn update_booking_status(
        store: &dyn Store,
        actor: Uuid,
        booking_id: Uuid,
        next: BookingStatus,
    ) -> AppResult<Booking> {
        let booking = store
            .booking_by_id(booking_id)
            .await?
            .ok_or(AppError::NotFound("booking"))?;

        if !booking.is_participant(actor) {
            warn!("Rejected status change by outsider");
            return Err(AppError::Ownership("not a participant of this booking"));
        }

        if !booking.status.can_transition_to(next) {
            warn!(current = %booking.status, "Rejected status transition");
            return Err(AppError::validation(format!(
                "cannot move a {} booking to {next}",
                booking.status
            )));
        }

        let provider_only = matches!(next, BookingStatus::Confirmed | BookingStatus::Completed);
        if provider_only && booking.provider_id != actor {
            warn!("Rejected provider transition by customer");
            return Err(AppError::Ownership("only the provider can confirm or complete"));
        }

        let updated = store
            .set_booking_status(booking_id, booking.status, next)
            .await?
            .ok_or_else(|| AppError::conflict("booking status changed concurrently"))?;

        info!(from = %booking.status, "Booking status updated");
        Ok(updated)
    }

    /// Appends a message to the booking's thread.
    #[instrument(skip_all, fields(actor = %actor, booking_id = %booking_id))]
    pub async fn add_booking_message(
        store: &dyn Store,
        actor: Uuid,
        booking_id: Uuid,
        text: &str,
    ) -> AppResult<Booking> {
        let text = text.trim();
        if text.is_empty() || text.chars().count() > MAX_BOOKING_MESSAGE_LEN {
            return Err(AppError::validation(format!(
                "message must be 1 to {MAX_BOOKING_MESSAGE_LEN} characters"
            )));
        }

        let booking = store
            .booking_by_id(booking_id)
            .await?
            .ok_or(AppError::NotFound("booking"))?;
        if !booking.is_participant(actor) {
            warn!("Rejected message from outsider");
            return Err(AppError::Ownership("not a participant of this booking"));
        }

        let updated = store
            .push_booking_message(booking_id, BookingMessage::new(actor, text))
            .await?
            .ok_or(AppError::NotFound("booking"))?;

        debug!(messages = updated.messages.len(), "Booking message added");
        Ok(updated)
    }

    #[instrument(skip_all, fields(actor = %actor, booking_id = %booking_id))]
    pub async fn get_booking(store: &dyn Store, actor: Uuid, booking_id: Uuid) -> AppResult<Booking> {
        let booking = store
            .booking_by_id(booking_id)
            .await?
            .ok_or(AppError::NotFound("booking"))?;

        if !booking.is_participant(actor) {
            return Err(AppError::Ownership("not a participant of this booking"));
        }
        Ok(booking)
    }

    /// The actor's bookings on one side, newest date first.
    #[instrument(skip_all, fields(actor = %actor, role = ?role))]
    pub async fn list_bookings(
        store: &dyn Store,
        actor: Uuid,
        role: BookingRole,
    ) -> AppResult<Vec<Booking>> {
        store.bookings_for_user(actor, role).await
    }
}
