mod common;

use chrono::Duration;
use uuid::Uuid;
use common::harness;
use ridepool_core::{Clock, CoreError, MetricsRepository};
use ridepool_shared::{ChatStatus, DomainEvent, NewTrip, ReservationStatus, TripStatus};

#[tokio::test]
async fn test_create_trip_seeds_ledger_and_counts_trip() {
    let h = harness();
    let driver = Uuid::new_v4();
    let trip = h.trip_for(driver, 4).await;

    assert_eq!(trip.status, TripStatus::Active);
    assert_eq!(trip.available_seats, 4);
    let entry = h.market.ledger.get_availability(trip.id).await.unwrap();
    assert_eq!((entry.available_seats, entry.reserved_seats), (4, 0));

    h.trip_for(driver, 2).await;
    let metrics = h.store.get_metrics(driver).await.unwrap().unwrap();
    assert_eq!(metrics.total_trips, 2);
}

#[tokio::test]
async fn test_create_trip_validation() {
    let h = harness();
    let now = h.clock.now();
    let valid = NewTrip {
        driver_id: Uuid::new_v4(),
        origin: "Osh".to_string(),
        destination: "Jalal-Abad".to_string(),
        departure_start: now + Duration::hours(1),
        departure_end: now + Duration::hours(2),
        total_seats: 3,
    };

    let blank = NewTrip { origin: "  ".to_string(), ..valid.clone() };
    let inverted = NewTrip { departure_end: valid.departure_start, ..valid.clone() };
    let seatless = NewTrip { total_seats: 0, ..valid.clone() };

    for input in [blank, inverted, seatless] {
        let result = h.market.trips.create_trip(input).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
    assert!(h.market.trips.create_trip(valid).await.is_ok());
}

#[tokio::test]
async fn test_cancel_trip_cascades() {
    let mut h = harness();
    let trip = h.trip(4).await;
    let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
    let pending = h.market.reservations.create(trip.id, p1, 1).await.unwrap();
    let confirmed = h.market.reservations.create(trip.id, p2, 2).await.unwrap();
    h.market.reservations.confirm(confirmed.id, trip.driver_id).await.unwrap();
    assert_eq!(h.available(trip.id).await, 1);
    h.drain_events();

    let outcome = h.market.trips.cancel_trip(trip.id, trip.driver_id).await.unwrap();

    assert_eq!(outcome.trip.status, TripStatus::Cancelled);
    assert_eq!(outcome.cancelled_reservations.len(), 2);
    assert_eq!(outcome.released_seats, 3);
    assert_eq!(h.available(trip.id).await, 4);
    for id in [pending.id, confirmed.id] {
        let reservation = h.market.reservations.get(id).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Cancelled);
        let chat = h.store.get_chat(reservation.chat_id.unwrap()).await.unwrap();
        assert_eq!(chat.status, ChatStatus::Archived);
    }

    let metrics = h.store.get_metrics(trip.driver_id).await.unwrap().unwrap();
    assert_eq!(metrics.cancelled_trips, 1);
    assert_eq!(metrics.cancelled_trips_with_passengers, 1);

    let events = h.drain_events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        DomainEvent::TripCancelled { passenger_ids, .. } => {
            assert_eq!(passenger_ids.len(), 2);
            assert!(passenger_ids.contains(&p1) && passenger_ids.contains(&p2));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_empty_trip_has_no_passengers() {
    let h = harness();
    let trip = h.trip(4).await;

    let outcome = h.market.trips.cancel_trip(trip.id, trip.driver_id).await.unwrap();

    assert_eq!(outcome.released_seats, 0);
    let metrics = h.store.get_metrics(trip.driver_id).await.unwrap().unwrap();
    assert_eq!(metrics.cancelled_trips, 1);
    assert_eq!(metrics.cancelled_trips_with_passengers, 0);
}

#[tokio::test]
async fn test_only_driver_acts_on_active_trip() {
    let h = harness();
    let trip = h.trip(2).await;

    let stranger = h.market.trips.cancel_trip(trip.id, Uuid::new_v4()).await;
    assert!(matches!(stranger, Err(CoreError::Conflict(_))));
    let stranger = h.market.trips.complete_trip(trip.id, Uuid::new_v4()).await;
    assert!(matches!(stranger, Err(CoreError::Conflict(_))));

    h.market.trips.complete_trip(trip.id, trip.driver_id).await.unwrap();

    let again = h.market.trips.cancel_trip(trip.id, trip.driver_id).await;
    assert!(matches!(again, Err(CoreError::Conflict(_))));
    let again = h.market.trips.complete_trip(trip.id, trip.driver_id).await;
    assert!(matches!(again, Err(CoreError::Conflict(_))));

    let missing = h.market.trips.cancel_trip(Uuid::new_v4(), trip.driver_id).await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_complete_trip_archives_chats_and_requests_reviews() {
    let mut h = harness();
    let trip = h.trip(4).await;
    let (rider, waiting) = (Uuid::new_v4(), Uuid::new_v4());
    let confirmed = h.market.reservations.create(trip.id, rider, 1).await.unwrap();
    h.market.reservations.confirm(confirmed.id, rider).await.unwrap();
    h.market.reservations.create(trip.id, waiting, 1).await.unwrap();
    h.drain_events();

    let completed = h.market.trips.complete_trip(trip.id, trip.driver_id).await.unwrap();

    assert_eq!(completed.status, TripStatus::Completed);
    let chat = h.store.get_chat(confirmed.chat_id.unwrap()).await.unwrap();
    assert_eq!(chat.status, ChatStatus::Archived);

    let reviews: Vec<_> = h.drain_events().into_iter()
        .filter(|e| matches!(e, DomainEvent::ReviewRequested { .. }))
        .collect();
    assert_eq!(reviews.len(), 1);
    assert!(matches!(&reviews[0], DomainEvent::ReviewRequested { passenger_id, .. } if *passenger_id == rider));

    let late = h.market.reservations.create(trip.id, Uuid::new_v4(), 1).await;
    assert!(matches!(late, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_listing_completes_lapsed_trips() {
    let h = harness();
    let driver = Uuid::new_v4();
    let early = h.trip_for(driver, 2).await;
    h.clock.advance(Duration::hours(2));
    let late = h.trip_for(driver, 2).await;

    h.clock.advance(Duration::hours(1) + Duration::minutes(30));
    let trips = h.market.trips.list_driver_trips(driver).await.unwrap();

    assert_eq!(trips.len(), 2);
    let status_of = |id| trips.iter().find(|t| t.id == id).map(|t| t.status);
    assert_eq!(status_of(early.id), Some(TripStatus::Completed));
    assert_eq!(status_of(late.id), Some(TripStatus::Active));
}

#[tokio::test]
async fn test_review_after_completed_ride() {
    let h = harness();
    let trip = h.trip(3).await;
    let (rider, other) = (Uuid::new_v4(), Uuid::new_v4());
    let ride = h.market.reservations.create(trip.id, rider, 1).await.unwrap();
    h.market.reservations.confirm(ride.id, trip.driver_id).await.unwrap();

    let early = h.market.reservations.review_driver(ride.id, rider, 5).await;
    assert!(matches!(early, Err(CoreError::Conflict(_))));

    h.market.trips.complete_trip(trip.id, trip.driver_id).await.unwrap();

    let stranger = h.market.reservations.review_driver(ride.id, other, 5).await;
    assert!(matches!(stranger, Err(CoreError::Conflict(_))));
    let out_of_range = h.market.reservations.review_driver(ride.id, rider, 9).await;
    assert!(matches!(out_of_range, Err(CoreError::Validation(_))));

    let driver = h.market.reservations.review_driver(ride.id, rider, 4).await.unwrap();
    assert_eq!(driver, trip.driver_id);
    let metrics = h.store.get_metrics(trip.driver_id).await.unwrap().unwrap();
    assert_eq!(metrics.avg_rating, Some(4.0));
    assert_eq!(metrics.total_reviews, 1);

    let again = h.market.reservations.review_driver(ride.id, rider, 1).await;
    assert!(matches!(again, Err(CoreError::Conflict(_))));
    let metrics = h.store.get_metrics(trip.driver_id).await.unwrap().unwrap();
    assert_eq!(metrics.avg_rating, Some(4.0));
    assert_eq!(metrics.total_reviews, 1);
    assert!(h.market.reservations.get(ride.id).await.unwrap().reviewed_at.is_some());
}

#[tokio::test]
async fn test_complete_trip_lapses_unconfirmed_holds() {
    let mut h = harness();
    let trip = h.trip(4).await;
    let (rider, waiting) = (Uuid::new_v4(), Uuid::new_v4());
    let confirmed = h.market.reservations.create(trip.id, rider, 1).await.unwrap();
    h.market.reservations.confirm(confirmed.id, rider).await.unwrap();
    let pending = h.market.reservations.create(trip.id, waiting, 2).await.unwrap();
    assert_eq!(h.available(trip.id).await, 1);
    h.drain_events();

    h.market.trips.complete_trip(trip.id, trip.driver_id).await.unwrap();

    let lapsed = h.market.reservations.get(pending.id).await.unwrap();
    assert_eq!(lapsed.status, ReservationStatus::Expired);
    assert_eq!(h.available(trip.id).await, 3);
    let events = h.drain_events();
    assert!(events.iter().any(|e| matches!(e, DomainEvent::ReservationExpired { passenger_id, .. } if *passenger_id == waiting)));

    let late_confirm = h.market.reservations.confirm(pending.id, trip.driver_id).await;
    assert!(matches!(late_confirm, Err(CoreError::Conflict(_))));
    assert!(h.market.reservations.get_active_reservation(waiting).await.unwrap().is_none());

    // The sweep has nothing left to settle and leaves archived chats alone
    h.clock.advance(Duration::minutes(11));
    assert_eq!(h.market.scheduler.sweep_once().await.expired, 0);
    let chat = h.store.get_chat(pending.chat_id.unwrap()).await.unwrap();
    assert_eq!(chat.status, ChatStatus::Archived);

    // Only the confirmed ride counts as an outcome
    let metrics = h.store.get_metrics(trip.driver_id).await.unwrap().unwrap();
    assert_eq!(metrics.total_reservations, 1);
    assert_eq!(metrics.confirmed_reservations, 1);
}

#[tokio::test]
async fn test_manual_adjustment_respects_live_holds() {
    let h = harness();
    let trip = h.trip(3).await;
    h.market.reservations.create(trip.id, Uuid::new_v4(), 2).await.unwrap();

    // Offline rider takes the last seat, then cancels
    let entry = h.market.trips.adjust_seats(trip.id, trip.driver_id, -1).await.unwrap();
    assert_eq!(entry.available_seats, 0);
    let entry = h.market.trips.adjust_seats(trip.id, trip.driver_id, 1).await.unwrap();
    assert_eq!(entry.available_seats, 1);

    let over = h.market.trips.adjust_seats(trip.id, trip.driver_id, 1).await;
    assert!(matches!(over, Err(CoreError::Conflict(_))));
    let huge = h.market.trips.adjust_seats(trip.id, trip.driver_id, i32::MAX).await;
    assert!(matches!(huge, Err(CoreError::Conflict(_))));
    let stranger = h.market.trips.adjust_seats(trip.id, Uuid::new_v4(), -1).await;
    assert!(matches!(stranger, Err(CoreError::Conflict(_))));

    assert_eq!(h.available(trip.id).await, 1);
}
