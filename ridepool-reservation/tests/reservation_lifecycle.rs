mod common;

use chrono::Duration;
use uuid::Uuid;
use common::harness;
use ridepool_core::{Clock, CoreError, MetricsRepository, PresenceTracker, ReservationRepository};
use ridepool_shared::{ChatStatus, DomainEvent, ReservationStatus};

#[tokio::test]
async fn test_reserve_confirm_then_reserve_elsewhere() {
    let h = harness();
    let trip = h.trip(4).await;
    let other = h.trip(4).await;
    let passenger = Uuid::new_v4();

    let reservation = h.market.reservations.create(trip.id, passenger, 2).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert_eq!(reservation.expires_at, reservation.reserved_at + Duration::minutes(10));
    assert_eq!(h.available(trip.id).await, 2);

    let confirmed = h.market.reservations.confirm(reservation.id, trip.driver_id).await.unwrap();
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);
    assert_eq!(confirmed.confirmed_at, Some(h.clock.now()));

    let metrics = h.store.get_metrics(trip.driver_id).await.unwrap().unwrap();
    assert_eq!(metrics.total_reservations, 1);
    assert_eq!(metrics.confirmed_reservations, 1);
    assert_eq!(metrics.response_rate, 100.0);
    assert_eq!(metrics.avg_response_time, None);

    // A confirmed reservation is terminal and does not block a new hold
    let second = h.market.reservations.create(other.id, passenger, 1).await.unwrap();
    assert_eq!(second.status, ReservationStatus::Pending);
    assert_eq!(h.market.reservations.get(reservation.id).await.unwrap().status, ReservationStatus::Confirmed);
    assert_eq!(h.available(trip.id).await, 2);
}

#[tokio::test]
async fn test_last_seats_conflict() {
    let h = harness();
    let trip = h.trip(2).await;

    h.market.reservations.create(trip.id, Uuid::new_v4(), 2).await.unwrap();
    let result = h.market.reservations.create(trip.id, Uuid::new_v4(), 1).await;

    assert!(matches!(result, Err(CoreError::Conflict(_))));
    assert_eq!(h.available(trip.id).await, 0);
}

#[tokio::test]
async fn test_no_oversell_under_concurrency() {
    let h = harness();
    let trip = h.trip(3).await;
    let reservations = h.market.reservations.clone();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let reservations = reservations.clone();
        let trip_id = trip.id;
        handles.push(tokio::spawn(async move {
            reservations.create(trip_id, Uuid::new_v4(), 1).await
        }));
    }

    let (mut ok, mut conflicts) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(CoreError::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(ok, 3);
    assert_eq!(conflicts, 7);
    assert_eq!(h.available(trip.id).await, 0);
}

#[tokio::test]
async fn test_new_hold_supersedes_previous() {
    let h = harness();
    let first_trip = h.trip(3).await;
    let second_trip = h.trip(3).await;
    let passenger = Uuid::new_v4();

    let a = h.market.reservations.create(first_trip.id, passenger, 2).await.unwrap();
    let b = h.market.reservations.create(second_trip.id, passenger, 1).await.unwrap();

    let a = h.market.reservations.get(a.id).await.unwrap();
    assert_eq!(a.status, ReservationStatus::Cancelled);
    assert_eq!(h.available(first_trip.id).await, 3);
    assert_eq!(h.available(second_trip.id).await, 2);

    let active = h.market.reservations.get_active_reservation(passenger).await.unwrap().unwrap();
    assert_eq!(active.id, b.id);
}

#[tokio::test]
async fn test_concurrent_holds_for_one_passenger_leave_one_active() {
    let h = harness();
    let passenger = Uuid::new_v4();
    let mut trips = Vec::new();
    for _ in 0..5 {
        trips.push(h.trip(2).await);
    }

    let mut handles = Vec::new();
    for trip in &trips {
        let reservations = h.market.reservations.clone();
        let trip_id = trip.id;
        handles.push(tokio::spawn(async move { reservations.create(trip_id, passenger, 1).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut pending = 0;
    for trip in &trips {
        let live = h.store.list_for_trip(trip.id, &[ReservationStatus::Pending]).await.unwrap();
        pending += live.len();
        assert_eq!(h.available(trip.id).await, 2 - live.len() as i32);
    }
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn test_self_booking_rejected() {
    let h = harness();
    let trip = h.trip(3).await;

    let result = h.market.reservations.create(trip.id, trip.driver_id, 1).await;

    assert!(matches!(result, Err(CoreError::Validation(_))));
    assert_eq!(h.available(trip.id).await, 3);
}

#[tokio::test]
async fn test_create_preconditions() {
    let h = harness();
    let trip = h.trip(3).await;

    let missing = h.market.reservations.create(Uuid::new_v4(), Uuid::new_v4(), 1).await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));

    let zero = h.market.reservations.create(trip.id, Uuid::new_v4(), 0).await;
    assert!(matches!(zero, Err(CoreError::Validation(_))));

    h.market.trips.cancel_trip(trip.id, trip.driver_id).await.unwrap();
    let inactive = h.market.reservations.create(trip.id, Uuid::new_v4(), 1).await;
    assert!(matches!(inactive, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_failed_create_keeps_existing_hold() {
    let h = harness();
    let open = h.trip(3).await;
    let full = h.trip(1).await;
    let passenger = Uuid::new_v4();

    let held = h.market.reservations.create(open.id, passenger, 1).await.unwrap();
    h.market.reservations.create(full.id, Uuid::new_v4(), 1).await.unwrap();

    let result = h.market.reservations.create(full.id, passenger, 1).await;
    assert!(matches!(result, Err(CoreError::Conflict(_))));

    let active = h.market.reservations.get_active_reservation(passenger).await.unwrap().unwrap();
    assert_eq!(active.id, held.id);
}

#[tokio::test]
async fn test_losing_race_for_last_seat_keeps_existing_hold() {
    for _ in 0..20 {
        let h = harness();
        let open = h.trip(3).await;
        let contested = h.trip(1).await;
        let passenger = Uuid::new_v4();
        let held = h.market.reservations.create(open.id, passenger, 1).await.unwrap();

        let (mine, theirs) = tokio::join!(
            h.market.reservations.create(contested.id, passenger, 1),
            h.market.reservations.create(contested.id, Uuid::new_v4(), 1),
        );
        assert!(mine.is_ok() != theirs.is_ok());

        let active = h.market.reservations.get_active_reservation(passenger).await.unwrap().unwrap();
        match mine {
            Ok(won) => {
                assert_eq!(active.id, won.id);
                assert_eq!(h.available(open.id).await, 3);
            }
            Err(e) => {
                assert!(matches!(e, CoreError::Conflict(_)));
                assert_eq!(active.id, held.id);
                assert_eq!(h.available(open.id).await, 2);
            }
        }
        assert_eq!(h.available(contested.id).await, 0);
    }
}

#[tokio::test]
async fn test_rebooking_same_trip_reuses_own_seats() {
    let h = harness();
    let trip = h.trip(2).await;
    let passenger = Uuid::new_v4();
    let first = h.market.reservations.create(trip.id, passenger, 2).await.unwrap();
    assert_eq!(h.available(trip.id).await, 0);

    let second = h.market.reservations.create(trip.id, passenger, 1).await.unwrap();

    assert_eq!(h.market.reservations.get(first.id).await.unwrap().status, ReservationStatus::Cancelled);
    assert_eq!(second.status, ReservationStatus::Pending);
    assert_eq!(h.available(trip.id).await, 1);

    let too_many = h.market.reservations.create(trip.id, passenger, 3).await;
    assert!(matches!(too_many, Err(CoreError::Conflict(_))));
    let active = h.market.reservations.get_active_reservation(passenger).await.unwrap().unwrap();
    assert_eq!(active.id, second.id);
}

#[tokio::test]
async fn test_confirm_after_deadline_rejected() {
    let h = harness();
    let trip = h.trip(2).await;
    let passenger = Uuid::new_v4();
    let reservation = h.market.reservations.create(trip.id, passenger, 1).await.unwrap();

    h.clock.advance(Duration::minutes(10));
    let result = h.market.reservations.confirm(reservation.id, passenger).await;

    assert!(matches!(result, Err(CoreError::Conflict(_))));
    assert_eq!(h.market.reservations.get(reservation.id).await.unwrap().status, ReservationStatus::Pending);
    assert_eq!(h.available(trip.id).await, 1);
}

#[tokio::test]
async fn test_confirm_guards() {
    let h = harness();
    let trip = h.trip(2).await;
    let passenger = Uuid::new_v4();
    let reservation = h.market.reservations.create(trip.id, passenger, 1).await.unwrap();

    let stranger = h.market.reservations.confirm(reservation.id, Uuid::new_v4()).await;
    assert!(matches!(stranger, Err(CoreError::Conflict(_))));

    let missing = h.market.reservations.confirm(Uuid::new_v4(), passenger).await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));

    h.market.reservations.confirm(reservation.id, passenger).await.unwrap();
    let again = h.market.reservations.confirm(reservation.id, trip.driver_id).await;
    assert!(matches!(again, Err(CoreError::Conflict(_))));
}

#[tokio::test]
async fn test_passenger_confirmation_records_response_time() {
    let h = harness();
    let trip = h.trip(2).await;
    let passenger = Uuid::new_v4();
    let reservation = h.market.reservations.create(trip.id, passenger, 1).await.unwrap();

    h.clock.advance(Duration::seconds(45));
    h.market.reservations.confirm(reservation.id, passenger).await.unwrap();

    let metrics = h.store.get_metrics(trip.driver_id).await.unwrap().unwrap();
    assert_eq!(metrics.avg_response_time, Some(45.0));
    assert_eq!(metrics.response_samples, 1);
}

#[tokio::test]
async fn test_cancel_releases_once() {
    let h = harness();
    let trip = h.trip(4).await;
    let passenger = Uuid::new_v4();
    let reservation = h.market.reservations.create(trip.id, passenger, 3).await.unwrap();
    assert_eq!(h.available(trip.id).await, 1);

    let stranger = h.market.reservations.cancel(reservation.id, Uuid::new_v4()).await;
    assert!(matches!(stranger, Err(CoreError::Conflict(_))));

    let cancelled = h.market.reservations.cancel(reservation.id, passenger).await.unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert_eq!(h.available(trip.id).await, 4);

    // Another hold takes seats, then a repeated cancel must not hand them back
    h.market.reservations.create(trip.id, Uuid::new_v4(), 2).await.unwrap();
    let again = h.market.reservations.cancel(reservation.id, trip.driver_id).await.unwrap();
    assert_eq!(again.status, ReservationStatus::Cancelled);
    assert_eq!(h.available(trip.id).await, 2);
}

#[tokio::test]
async fn test_driver_can_cancel_confirmed_reservation() {
    let h = harness();
    let trip = h.trip(3).await;
    let passenger = Uuid::new_v4();
    let reservation = h.market.reservations.create(trip.id, passenger, 2).await.unwrap();
    h.market.reservations.confirm(reservation.id, trip.driver_id).await.unwrap();

    h.market.reservations.cancel(reservation.id, trip.driver_id).await.unwrap();

    assert_eq!(h.available(trip.id).await, 3);
}

#[tokio::test]
async fn test_expire_is_idempotent() {
    let h = harness();
    let trip = h.trip(3).await;
    let reservation = h.market.reservations.create(trip.id, Uuid::new_v4(), 2).await.unwrap();
    h.clock.advance(Duration::minutes(11));

    assert!(h.market.reservations.expire(reservation.id).await.unwrap());
    assert!(!h.market.reservations.expire(reservation.id).await.unwrap());
    assert!(!h.market.reservations.expire(Uuid::new_v4()).await.unwrap());

    assert_eq!(h.market.reservations.get(reservation.id).await.unwrap().status, ReservationStatus::Expired);
    assert_eq!(h.available(trip.id).await, 3);

    let metrics = h.store.get_metrics(trip.driver_id).await.unwrap().unwrap();
    assert_eq!(metrics.total_reservations, 1);
    assert_eq!(metrics.confirmed_reservations, 0);
}

#[tokio::test]
async fn test_expire_skips_settled_reservation() {
    let h = harness();
    let trip = h.trip(3).await;
    let passenger = Uuid::new_v4();
    let reservation = h.market.reservations.create(trip.id, passenger, 1).await.unwrap();
    h.market.reservations.confirm(reservation.id, passenger).await.unwrap();

    assert!(!h.market.reservations.expire(reservation.id).await.unwrap());
    assert_eq!(h.market.reservations.get(reservation.id).await.unwrap().status, ReservationStatus::Confirmed);
    assert_eq!(h.available(trip.id).await, 2);
}

#[tokio::test]
async fn test_chat_follows_reservation() {
    let h = harness();
    let trip = h.trip(3).await;
    let passenger = Uuid::new_v4();

    let cancelled = h.market.reservations.create(trip.id, passenger, 1).await.unwrap();
    let chat_id = cancelled.chat_id.unwrap();
    assert_eq!(h.store.get_chat(chat_id).await.unwrap().status, ChatStatus::Active);
    h.market.reservations.cancel(cancelled.id, passenger).await.unwrap();
    assert_eq!(h.store.get_chat(chat_id).await.unwrap().status, ChatStatus::Archived);

    let lapsed = h.market.reservations.create(trip.id, passenger, 1).await.unwrap();
    h.clock.advance(Duration::minutes(11));
    h.market.reservations.expire(lapsed.id).await.unwrap();
    let chat = h.store.get_chat(lapsed.chat_id.unwrap()).await.unwrap();
    assert_eq!(chat.status, ChatStatus::ReadOnly);
}

#[tokio::test]
async fn test_transitions_emit_events() {
    let mut h = harness();
    let trip = h.trip(3).await;
    let passenger = Uuid::new_v4();

    let reservation = h.market.reservations.create(trip.id, passenger, 1).await.unwrap();
    h.market.reservations.confirm(reservation.id, trip.driver_id).await.unwrap();

    let events = h.drain_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        DomainEvent::ReservationCreated { reservation_id, seat_count: 1, .. } if *reservation_id == reservation.id
    ));
    assert!(matches!(
        &events[1],
        DomainEvent::ReservationConfirmed { confirmed_by, .. } if *confirmed_by == trip.driver_id
    ));
}

#[tokio::test]
async fn test_driver_responsiveness() {
    let h = harness();
    let trip = h.trip(3).await;
    let reservation = h.market.reservations.create(trip.id, Uuid::new_v4(), 1).await.unwrap();

    // Never seen
    assert!(!h.market.reservations.is_driver_responsive(reservation.id).await.unwrap());

    h.clock.advance(Duration::seconds(30));
    h.store.record_heartbeat(trip.driver_id, true, h.clock.now()).await.unwrap();
    assert!(h.market.reservations.is_driver_responsive(reservation.id).await.unwrap());

    // Seen, but longer ago than the response timeout
    h.clock.advance(Duration::minutes(3));
    assert!(!h.market.reservations.is_driver_responsive(reservation.id).await.unwrap());

    h.store.record_heartbeat(trip.driver_id, false, h.clock.now()).await.unwrap();
    assert!(!h.market.reservations.is_driver_responsive(reservation.id).await.unwrap());
}

#[tokio::test]
async fn test_heartbeat_before_reservation_is_not_responsive() {
    let h = harness();
    let trip = h.trip(3).await;
    h.store.record_heartbeat(trip.driver_id, true, h.clock.now()).await.unwrap();

    h.clock.advance(Duration::seconds(10));
    let reservation = h.market.reservations.create(trip.id, Uuid::new_v4(), 1).await.unwrap();

    assert!(!h.market.reservations.is_driver_responsive(reservation.id).await.unwrap());
}

#[tokio::test]
async fn test_vanished_trip_is_an_integrity_error() {
    let h = harness();
    let trip = h.trip(3).await;
    let reservation = h.market.reservations.create(trip.id, Uuid::new_v4(), 1).await.unwrap();
    h.store.remove_trip(trip.id).await;
    h.clock.advance(Duration::minutes(11));

    let result = h.market.reservations.expire(reservation.id).await;

    assert!(matches!(result, Err(CoreError::Internal(_))));
}
