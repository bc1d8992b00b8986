mod common;

use servicehub::error::AppError;
use servicehub::models::{BookingRole, BookingStatus, NewBooking, RescheduleRequest};
use servicehub::services::{BookingService, ListingService, TimeSlot};
use time::macros::{date, time};

use common::{book, booking_request, memory_state, publish, register};

#[test_log::test(tokio::test)]
async fn test_booking_prices_and_records_provider() {
    let state = memory_state();
    let provider = register(&state, "tutor").await;
    let customer = register(&state, "student").await;
    let listing = publish(&state, &provider, "Calculus tutoring", "tutoring", 20.0).await;

    let mut request = booking_request(listing.id, date!(2025 - 03 - 01), "10:00", 2);
    request.message = Some("  Chapter 4 please  ".to_string());
    let booking = BookingService::create_booking(state.store(), customer.id, request)
        .await
        .unwrap();

    assert_eq!(booking.total_price, 40.0);
    assert_eq!(booking.provider_id, provider.id);
    assert_eq!(booking.customer_id, customer.id);
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.start_time, time!(10:00));
    assert_eq!(booking.messages.len(), 1);
    assert_eq!(booking.messages[0].text, "Chapter 4 please");
    assert_eq!(booking.messages[0].sender_id, customer.id);
}

#[test_log::test(tokio::test)]
async fn test_overlapping_booking_is_rejected_with_existing_booking() {
    let state = memory_state();
    let provider = register(&state, "tutor").await;
    let first = register(&state, "first").await;
    let second = register(&state, "second").await;
    let listing = publish(&state, &provider, "Calculus tutoring", "tutoring", 20.0).await;
    let day = date!(2025 - 03 - 01);

    let a = book(&state, &first, listing.id, day, "10:00", 2).await.unwrap();

    let err = book(&state, &second, listing.id, day, "11:00", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
    assert_eq!(err.conflicting_booking().map(|b| b.id), Some(a.id));

    // Touching the end of A is fine, as is another day
    book(&state, &second, listing.id, day, "12:00", 1).await.unwrap();
    book(&state, &second, listing.id, date!(2025 - 03 - 02), "10:00", 2)
        .await
        .unwrap();
}

#[test_log::test(tokio::test)]
async fn test_cancelled_and_completed_bookings_free_the_slot() {
    let state = memory_state();
    let provider = register(&state, "tutor").await;
    let customer = register(&state, "student").await;
    let listing = publish(&state, &provider, "Piano lessons", "music", 30.0).await;
    let day = date!(2025 - 03 - 01);

    let cancelled = book(&state, &customer, listing.id, day, "10:00", 2).await.unwrap();
    BookingService::update_booking_status(
        state.store(),
        customer.id,
        cancelled.id,
        BookingStatus::Cancelled,
    )
    .await
    .unwrap();

    let completed = book(&state, &customer, listing.id, day, "10:00", 2).await.unwrap();
    for next in [BookingStatus::Confirmed, BookingStatus::Completed] {
        BookingService::update_booking_status(state.store(), provider.id, completed.id, next)
            .await
            .unwrap();
    }

    book(&state, &customer, listing.id, day, "10:30", 1).await.unwrap();
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_concurrent_overlapping_bookings_exactly_one_succeeds() {
    let state = memory_state();
    let provider = register(&state, "tutor").await;
    let listing = publish(&state, &provider, "Exam cram session", "tutoring", 25.0).await;

    let mut customers = Vec::new();
    for i in 0..8 {
        customers.push(register(&state, &format!("racer{i}")).await);
    }

    let listing_id = listing.id;
    let handles: Vec<_> = customers
        .into_iter()
        .enumerate()
        .map(|(i, customer)| {
            let state = state.clone();
            // Every request overlaps 10:00-11:00
            let start = if i % 2 == 0 { "10:00" } else { "09:30" };
            tokio::spawn(async move {
                BookingService::create_booking(
                    state.store(),
                    customer.id,
                    booking_request(listing_id, date!(2025 - 03 - 01), start, 2),
                )
                .await
            })
        })
        .collect();

    let mut succeeded = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(AppError::Conflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    assert_eq!(succeeded, 1);
    assert_eq!(conflicts, 7);
}

#[test_log::test(tokio::test)]
async fn test_booking_input_validation() {
    let state = memory_state();
    let provider = register(&state, "tutor").await;
    let customer = register(&state, "student").await;
    let listing = publish(&state, &provider, "Calculus tutoring", "tutoring", 20.0).await;
    let day = date!(2025 - 03 - 01);

    for (start, hours) in [("10:00", 0), ("10:00", -2), ("10:00", 25), ("7pm", 1), ("24:00", 1)] {
        let err = book(&state, &customer, listing.id, day, start, hours)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)), "{start} {hours}h: {err:?}");
    }

    let err = book(&state, &customer, uuid::Uuid::new_v4(), day, "10:00", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("listing")));
}

#[test_log::test(tokio::test)]
async fn test_reschedule_ignores_own_slot_and_reprices() {
    let state = memory_state();
    let provider = register(&state, "tutor").await;
    let customer = register(&state, "student").await;
    let other = register(&state, "other").await;
    let listing = publish(&state, &provider, "Calculus tutoring", "tutoring", 20.0).await;
    let day = date!(2025 - 03 - 01);

    let booking = book(&state, &customer, listing.id, day, "10:00", 2).await.unwrap();
    let blocker = book(&state, &other, listing.id, day, "14:00", 1).await.unwrap();
    BookingService::update_booking_status(
        state.store(),
        provider.id,
        booking.id,
        BookingStatus::Confirmed,
    )
    .await
    .unwrap();

    let moved = BookingService::reschedule_booking(
        state.store(),
        customer.id,
        booking.id,
        RescheduleRequest {
            date: day,
            start_time: "11:00".to_string(),
            duration_hours: 3,
        },
    )
    .await
    .unwrap();
    assert_eq!(moved.start_time, time!(11:00));
    assert_eq!(moved.total_price, 60.0);
    assert_eq!(moved.status, BookingStatus::Pending);

    let err = BookingService::reschedule_booking(
        state.store(),
        customer.id,
        booking.id,
        RescheduleRequest {
            date: day,
            start_time: "13:00".to_string(),
            duration_hours: 2,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.conflicting_booking().map(|b| b.id), Some(blocker.id));

    let err = BookingService::reschedule_booking(
        state.store(),
        provider.id,
        booking.id,
        RescheduleRequest {
            date: day,
            start_time: "08:00".to_string(),
            duration_hours: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Ownership(_)));
}

#[test_log::test(tokio::test)]
async fn test_status_transitions_and_permissions() {
    let state = memory_state();
    let provider = register(&state, "tutor").await;
    let customer = register(&state, "student").await;
    let stranger = register(&state, "stranger").await;
    let listing = publish(&state, &provider, "Calculus tutoring", "tutoring", 20.0).await;
    let booking = book(&state, &customer, listing.id, date!(2025 - 03 - 01), "10:00", 1)
        .await
        .unwrap();
    let store = state.store();

    let err =
        BookingService::update_booking_status(store, customer.id, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::Ownership(_)));

    let err =
        BookingService::update_booking_status(store, stranger.id, booking.id, BookingStatus::Cancelled)
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::Ownership(_)));

    let err =
        BookingService::update_booking_status(store, provider.id, booking.id, BookingStatus::Completed)
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let confirmed =
        BookingService::update_booking_status(store, provider.id, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    let err =
        BookingService::update_booking_status(store, provider.id, booking.id, BookingStatus::Pending)
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let completed =
        BookingService::update_booking_status(store, provider.id, booking.id, BookingStatus::Completed)
            .await
            .unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);

    let err =
        BookingService::update_booking_status(store, customer.id, booking.id, BookingStatus::Cancelled)
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[test_log::test(tokio::test)]
async fn test_message_thread_and_visibility() {
    let state = memory_state();
    let provider = register(&state, "tutor").await;
    let customer = register(&state, "student").await;
    let stranger = register(&state, "stranger").await;
    let listing = publish(&state, &provider, "Calculus tutoring", "tutoring", 20.0).await;
    let booking = book(&state, &customer, listing.id, date!(2025 - 03 - 01), "10:00", 1)
        .await
        .unwrap();
    let store = state.store();

    BookingService::add_booking_message(store, customer.id, booking.id, "See you at the library")
        .await
        .unwrap();
    let thread = BookingService::add_booking_message(store, provider.id, booking.id, "Sounds good")
        .await
        .unwrap();
    let senders: Vec<_> = thread.messages.iter().map(|m| m.sender_id).collect();
    assert_eq!(senders, vec![customer.id, provider.id]);

    let err = BookingService::add_booking_message(store, stranger.id, booking.id, "Hi")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Ownership(_)));

    let err = BookingService::add_booking_message(store, customer.id, booking.id, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let fetched = BookingService::get_booking(store, provider.id, booking.id)
        .await
        .unwrap();
    assert_eq!(fetched.messages.len(), 2);

    let err = BookingService::get_booking(store, stranger.id, booking.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Ownership(_)));
}

#[test_log::test(tokio::test)]
async fn test_list_bookings_by_role_newest_date_first() {
    let state = memory_state();
    let provider = register(&state, "tutor").await;
    let customer = register(&state, "student").await;
    let listing = publish(&state, &provider, "Calculus tutoring", "tutoring", 20.0).await;

    let early = book(&state, &customer, listing.id, date!(2025 - 03 - 01), "10:00", 1)
        .await
        .unwrap();
    let late = book(&state, &customer, listing.id, date!(2025 - 03 - 08), "09:00", 1)
        .await
        .unwrap();

    let as_customer = BookingService::list_bookings(state.store(), customer.id, BookingRole::Customer)
        .await
        .unwrap();
    let ids: Vec<_> = as_customer.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![late.id, early.id]);

    let as_provider = BookingService::list_bookings(state.store(), provider.id, BookingRole::Provider)
        .await
        .unwrap();
    assert_eq!(as_provider.len(), 2);

    let none = BookingService::list_bookings(state.store(), provider.id, BookingRole::Customer)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[test_log::test(tokio::test)]
async fn test_deleted_listing_accepts_no_booking_writes() {
    let state = memory_state();
    let provider = register(&state, "tutor").await;
    let customer = register(&state, "student").await;
    let listing = publish(&state, &provider, "Calculus tutoring", "tutoring", 20.0).await;
    let day = date!(2025 - 03 - 01);
    let booking = book(&state, &customer, listing.id, day, "10:00", 1).await.unwrap();

    ListingService::delete_listing(state.store(), provider.id, listing.id)
        .await
        .unwrap();

    let later = TimeSlot::new(day, time!(15:00), 1).unwrap();
    let err = state
        .store()
        .insert_booking(NewBooking {
            listing_id: listing.id,
            customer_id: customer.id,
            provider_id: provider.id,
            slot: later,
            total_price: 20.0,
            messages: Vec::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("listing")));

    let err = state
        .store()
        .reschedule_booking(booking.id, later, 20.0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("listing")));

    let err = BookingService::reschedule_booking(
        state.store(),
        customer.id,
        booking.id,
        RescheduleRequest {
            date: day,
            start_time: "15:00".to_string(),
            duration_hours: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound("listing")));

    let unchanged = BookingService::get_booking(state.store(), customer.id, booking.id)
        .await
        .unwrap();
    assert_eq!(unchanged.start_time, time!(10:00));
}

#[test_log::test(tokio::test)]
async fn test_rescheduling_a_cancelled_booking_changes_nothing() {
    let state = memory_state();
    let provider = register(&state, "tutor").await;
    let customer = register(&state, "student").await;
    let other = register(&state, "other").await;
    let listing = publish(&state, &provider, "Calculus tutoring", "tutoring", 20.0).await;
    let day = date!(2025 - 03 - 01);

    let booking = book(&state, &customer, listing.id, day, "10:00", 1).await.unwrap();
    book(&state, &other, listing.id, day, "14:00", 1).await.unwrap();
    BookingService::update_booking_status(
        state.store(),
        customer.id,
        booking.id,
        BookingStatus::Cancelled,
    )
    .await
    .unwrap();

    // The target slot overlaps another booking, but a cancelled booking is
    // never moved, so no conflict is reported.
    let taken = TimeSlot::new(day, time!(14:00), 1).unwrap();
    let moved = state
        .store()
        .reschedule_booking(booking.id, taken, 20.0)
        .await
        .unwrap();
    assert!(moved.is_none());

    let unchanged = BookingService::get_booking(state.store(), customer.id, booking.id)
        .await
        .unwrap();
    assert_eq!(unchanged.status, BookingStatus::Cancelled);
    assert_eq!(unchanged.start_time, time!(10:00));
}
