use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use ridepool_core::{
    ChatService, Clock, CoreError, CoreResult, Datastore, KeyGuard, KeyedLocks, PresenceTracker,
    ReservationPolicy,
};
use ridepool_ledger::SeatLedger;
use ridepool_ranking::RankingEngine;
use ridepool_shared::{
    ChatStatus, DomainEvent, Reservation, ReservationStatus, ScheduledTask, TaskKind, Trip, TripStatus,
};

use crate::dispatcher::Outbox;
use crate::integrity;

/// Reservation state machine: PENDING -> CONFIRMED | CANCELLED | EXPIRED.
///
/// Transitions on a trip run under that trip's lock (shared with the seat ledger), so
/// seat checks and seat writes for one trip are linearizable. `create` additionally
/// holds the passenger's lock across supersede + insert, which keeps the
/// one-active-hold-per-passenger invariant inside this process.
pub struct ReservationManager {
    store: Arc<dyn Datastore>,
    ledger: Arc<SeatLedger>,
    ranking: Arc<RankingEngine>,
    chats: Arc<dyn ChatService>,
    presence: Arc<dyn PresenceTracker>,
    clock: Arc<dyn Clock>,
    outbox: Outbox,
    policy: ReservationPolicy,
    passenger_locks: KeyedLocks,
}

impl ReservationManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Datastore>,
        ledger: Arc<SeatLedger>,
        ranking: Arc<RankingEngine>,
        chats: Arc<dyn ChatService>,
        presence: Arc<dyn PresenceTracker>,
        clock: Arc<dyn Clock>,
        outbox: Outbox,
        policy: ReservationPolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            ranking,
            chats,
            presence,
            clock,
            outbox,
            policy,
            passenger_locks: KeyedLocks::new(),
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Place a soft hold on `seat_count` seats. An earlier live hold of the same
    /// passenger is cancelled first; if the new hold cannot be placed the earlier one
    /// is left untouched.
    pub async fn create(&self, trip_id: Uuid, passenger_id: Uuid, seat_count: i32) -> CoreResult<Reservation> {
        if seat_count < 1 {
            return Err(CoreError::Validation(format!("seat count must be at least 1, got {}", seat_count)));
        }

        let _passenger = self.passenger_locks.lock(passenger_id).await;

        // 1-4. Trip exists, is not the passenger's own, is active and has room
        let previous = self.store.find_active_for_passenger(passenger_id, self.clock.now()).await?;
        let trip = self.load_trip(trip_id).await?;
        check_bookable(&trip, passenger_id, seat_count, seats_returned(previous.as_ref(), trip_id))?;

        // 5. Lock the target trip, plus the superseded hold's trip when it differs
        let (guard, previous_guard) = match &previous {
            Some(p) if p.trip_id != trip_id => {
                let (target, other) = self.lock_trip_pair(trip_id, p.trip_id).await;
                (target, Some(other))
            }
            _ => (self.lock_trip(trip_id).await, None),
        };

        // 6. Re-check under the locks; the loser of a race for the last seats fails here
        let now = self.clock.now();
        let previous = match previous {
            Some(p) => self.store.get_reservation(p.id).await?.filter(|r| r.is_active_at(now)),
            None => None,
        };
        let trip = self.load_trip(trip_id).await?;
        let returned = seats_returned(previous.as_ref(), trip_id);
        check_bookable(&trip, passenger_id, seat_count, returned)?;

        // 7. Silently supersede the passenger's live hold
        let superseded = match previous {
            Some(previous) => {
                info!("Passenger {} replaces reservation {} with a new hold on trip {}", passenger_id, previous.id, trip_id);
                let previous_trip = self.load_trip(previous.trip_id).await.map_err(integrity)?;
                let held = previous_guard.as_ref().unwrap_or(&guard);
                Some((self.release(held, previous, ReservationStatus::Cancelled).await?, previous_trip))
            }
            None => None,
        };
        drop(previous_guard);

        // 8. Take the seats and persist the hold
        let mut reservation = Reservation::new(trip_id, passenger_id, seat_count, now, self.policy.hold_duration);

        let expected = trip.available_seats + returned - seat_count;
        let entry = self.ledger.adjust_locked(&guard, -seat_count).await.map_err(integrity)?;
        if entry.available_seats != expected {
            error!(
                "Seat ledger mismatch on trip {}: expected {} available, ledger has {}",
                trip_id, expected, entry.available_seats
            );
        }

        if let Err(e) = self.store.insert_reservation(&reservation).await {
            // Give the seats back before surfacing the failure
            if let Err(release) = self.ledger.adjust_locked(&guard, seat_count).await {
                error!("Could not release {} seats on trip {} after failed insert: {}", seat_count, trip_id, release);
            }
            return Err(e);
        }
        drop(guard);

        info!(
            "Reservation {} created: passenger {} holds {} seat(s) on trip {} until {}",
            reservation.id, passenger_id, seat_count, trip_id, reservation.expires_at
        );

        // 9. Side effects, all best-effort
        if let Some((previous, previous_trip)) = &superseded {
            self.announce_cancellation(previous, previous_trip, passenger_id).await;
        }
        reservation.chat_id = self.open_chat(&reservation, &trip).await;
        if reservation.chat_id.is_some() {
            if let Err(e) = self.store.update_reservation(&reservation).await {
                warn!("Could not store chat reference on reservation {}: {}", reservation.id, e);
            }
        }
        self.schedule_expiry_warning(&reservation).await;

        self.outbox.emit(DomainEvent::ReservationCreated {
            reservation_id: reservation.id,
            trip_id,
            driver_id: trip.driver_id,
            passenger_id,
            seat_count,
            expires_at: reservation.expires_at,
        });

        Ok(reservation)
    }

    /// Either party may confirm a live hold
    pub async fn confirm(&self, reservation_id: Uuid, actor_id: Uuid) -> CoreResult<Reservation> {
        let (guard, mut reservation) = self.lock_reservation(reservation_id).await?;
        let trip = self.load_trip(reservation.trip_id).await?;

        if actor_id != reservation.passenger_id && actor_id != trip.driver_id {
            return Err(CoreError::Conflict(format!("user {} is not a party to reservation {}", actor_id, reservation_id)));
        }
        if reservation.status != ReservationStatus::Pending {
            return Err(CoreError::Conflict(format!(
                "reservation {} is {}, only PENDING can be confirmed",
                reservation_id, reservation.status.as_str()
            )));
        }
        if !trip.is_active() {
            return Err(CoreError::Conflict(format!(
                "trip {} is {}, its holds can no longer be confirmed",
                trip.id, trip.status.as_str()
            )));
        }

        // The sweep may not have run yet; the deadline still applies
        let now = self.clock.now();
        if reservation.is_expired_at(now) {
            return Err(CoreError::Conflict(format!("reservation {} hold expired at {}", reservation_id, reservation.expires_at)));
        }

        reservation.update_status(ReservationStatus::Confirmed, now);
        self.store.update_reservation(&reservation).await?;
        drop(guard);

        info!("Reservation {} confirmed by {}", reservation_id, actor_id);

        let response_time = if actor_id == reservation.passenger_id {
            Some((now - reservation.reserved_at).num_milliseconds() as f64 / 1000.0)
        } else {
            None
        };
        self.report_outcome(trip.driver_id, response_time, true).await;

        self.outbox.emit(DomainEvent::ReservationConfirmed {
            reservation_id,
            trip_id: trip.id,
            driver_id: trip.driver_id,
            passenger_id: reservation.passenger_id,
            confirmed_by: actor_id,
        });

        Ok(reservation)
    }

    /// Cancel by either party. Seats go back only if the reservation still held them,
    /// so repeated cancels never release twice.
    pub async fn cancel(&self, reservation_id: Uuid, actor_id: Uuid) -> CoreResult<Reservation> {
        let (guard, reservation) = self.lock_reservation(reservation_id).await?;
        let trip = self.load_trip(reservation.trip_id).await?;

        if actor_id != reservation.passenger_id && actor_id != trip.driver_id {
            return Err(CoreError::Conflict(format!("user {} is not a party to reservation {}", actor_id, reservation_id)));
        }
        if !reservation.status.holds_seats() {
            debug!("Reservation {} already {}, nothing to cancel", reservation_id, reservation.status.as_str());
            return Ok(reservation);
        }

        let reservation = self.release(&guard, reservation, ReservationStatus::Cancelled).await?;
        drop(guard);

        self.announce_cancellation(&reservation, &trip, actor_id).await;
        Ok(reservation)
    }

    /// Lapse an unconfirmed hold. Missing or settled reservations are a no-op.
    /// Returns whether a transition happened.
    pub async fn expire(&self, reservation_id: Uuid) -> CoreResult<bool> {
        match self.store.get_reservation(reservation_id).await? {
            Some(r) if r.status == ReservationStatus::Pending => {}
            _ => {
                debug!("Reservation {} missing or settled, skipping expiry", reservation_id);
                return Ok(false);
            }
        }

        let (guard, reservation) = self.lock_reservation(reservation_id).await?;
        // Settled while we waited for the lock
        if reservation.status != ReservationStatus::Pending {
            return Ok(false);
        }
        let trip = self.load_trip(reservation.trip_id).await.map_err(integrity)?;

        let reservation = self.release(&guard, reservation, ReservationStatus::Expired).await?;
        drop(guard);

        info!("Reservation {} expired, {} seat(s) back on trip {}", reservation_id, reservation.seat_count, trip.id);

        self.report_outcome(trip.driver_id, None, false).await;
        self.set_chat_status(&reservation, ChatStatus::ReadOnly).await;
        self.outbox.emit(DomainEvent::ReservationExpired {
            reservation_id,
            trip_id: trip.id,
            driver_id: trip.driver_id,
            passenger_id: reservation.passenger_id,
        });

        Ok(true)
    }

    /// Fire a due pre-expiry warning. The task is completed whether or not the hold is
    /// still live. Returns whether a warning went out.
    pub async fn fire_expiry_warning(&self, task: &ScheduledTask) -> CoreResult<bool> {
        let now = self.clock.now();
        let live = self.store.get_reservation(task.reservation_id).await?
            .filter(|r| r.is_active_at(now));

        if let Some(reservation) = &live {
            self.outbox.emit(DomainEvent::ReservationExpiringSoon {
                reservation_id: reservation.id,
                trip_id: reservation.trip_id,
                passenger_id: reservation.passenger_id,
                expires_at: reservation.expires_at,
            });
        }

        self.store.complete_task(task.id, now).await?;
        Ok(live.is_some())
    }

    /// Passenger rates the driver of a completed ride, once per reservation
    pub async fn review_driver(&self, reservation_id: Uuid, actor_id: Uuid, rating: u8) -> CoreResult<Uuid> {
        let (_guard, mut reservation) = self.lock_reservation(reservation_id).await?;
        if reservation.passenger_id != actor_id {
            return Err(CoreError::Conflict(format!("only the passenger can review reservation {}", reservation_id)));
        }
        if reservation.status != ReservationStatus::Confirmed {
            return Err(CoreError::Conflict(format!(
                "reservation {} is {}, only confirmed rides can be reviewed",
                reservation_id, reservation.status.as_str()
            )));
        }
        if let Some(reviewed_at) = reservation.reviewed_at {
            return Err(CoreError::Conflict(format!("reservation {} was already reviewed at {}", reservation_id, reviewed_at)));
        }
        let trip = self.load_trip(reservation.trip_id).await?;
        if trip.status != TripStatus::Completed {
            return Err(CoreError::Conflict(format!("trip {} has not been completed", trip.id)));
        }

        self.ranking.record_review(trip.driver_id, rating).await?;

        let now = self.clock.now();
        reservation.reviewed_at = Some(now);
        reservation.updated_at = now;
        self.store.update_reservation(&reservation).await?;

        info!("Driver {} rated {} for reservation {}", trip.driver_id, rating, reservation_id);
        Ok(trip.driver_id)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get(&self, reservation_id: Uuid) -> CoreResult<Reservation> {
        self.store.get_reservation(reservation_id).await?
            .ok_or_else(|| CoreError::not_found("reservation", reservation_id))
    }

    /// The passenger's PENDING, unexpired hold, if any
    pub async fn get_active_reservation(&self, passenger_id: Uuid) -> CoreResult<Option<Reservation>> {
        self.store.find_active_for_passenger(passenger_id, self.clock.now()).await
    }

    /// Liveness heuristic, recomputed on every call: the driver is online and has been
    /// seen since the hold was placed and within the response timeout.
    pub async fn is_driver_responsive(&self, reservation_id: Uuid) -> CoreResult<bool> {
        let reservation = self.get(reservation_id).await?;
        let trip = self.load_trip(reservation.trip_id).await?;
        let presence = self.presence.presence(trip.driver_id).await?;
        let now = self.clock.now();

        Ok(match presence.last_seen {
            Some(seen) => {
                presence.is_online
                    && seen >= reservation.reserved_at
                    && seen >= now - self.policy.response_timeout
            }
            None => false,
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn lock_trip(&self, trip_id: Uuid) -> KeyGuard {
        self.ledger.locks().lock(trip_id).await
    }

    /// Lock two different trips in id order. Returns `(target, other)`.
    async fn lock_trip_pair(&self, target: Uuid, other: Uuid) -> (KeyGuard, KeyGuard) {
        if target < other {
            let first = self.lock_trip(target).await;
            (first, self.lock_trip(other).await)
        } else {
            let first = self.lock_trip(other).await;
            (self.lock_trip(target).await, first)
        }
    }

    /// Move a seat-holding reservation to `status` and give its seats back.
    /// `guard` must be the reservation's trip lock.
    async fn release(&self, guard: &KeyGuard, mut reservation: Reservation, status: ReservationStatus) -> CoreResult<Reservation> {
        reservation.update_status(status, self.clock.now());
        self.store.update_reservation(&reservation).await?;
        self.ledger.adjust_locked(guard, reservation.seat_count).await.map_err(integrity)?;
        Ok(reservation)
    }

    async fn announce_cancellation(&self, reservation: &Reservation, trip: &Trip, actor_id: Uuid) {
        info!("Reservation {} cancelled by {}, {} seat(s) released", reservation.id, actor_id, reservation.seat_count);

        self.set_chat_status(reservation, ChatStatus::Archived).await;
        self.outbox.emit(DomainEvent::ReservationCancelled {
            reservation_id: reservation.id,
            trip_id: trip.id,
            driver_id: trip.driver_id,
            passenger_id: reservation.passenger_id,
            cancelled_by: actor_id,
        });
    }

    /// Take the reservation's trip lock and re-read the reservation under it
    async fn lock_reservation(&self, reservation_id: Uuid) -> CoreResult<(KeyGuard, Reservation)> {
        let reservation = self.get(reservation_id).await?;
        let guard = self.lock_trip(reservation.trip_id).await;
        let reservation = self.get(reservation_id).await?;
        Ok((guard, reservation))
    }

    async fn load_trip(&self, trip_id: Uuid) -> CoreResult<Trip> {
        self.store.get_trip(trip_id).await?
            .ok_or_else(|| CoreError::not_found("trip", trip_id))
    }

    async fn open_chat(&self, reservation: &Reservation, trip: &Trip) -> Option<Uuid> {
        match self.chats.create_chat(reservation.id, trip.id, trip.driver_id, reservation.passenger_id).await {
            Ok(chat_id) => Some(chat_id),
            Err(e) => {
                warn!("Chat creation for reservation {} failed: {}", reservation.id, e);
                None
            }
        }
    }

    async fn set_chat_status(&self, reservation: &Reservation, status: ChatStatus) {
        let Some(chat_id) = reservation.chat_id else {
            return;
        };
        if let Err(e) = self.chats.set_chat_status(chat_id, status).await {
            warn!("Could not set chat {} to {}: {}", chat_id, status.as_str(), e);
        }
    }

    async fn schedule_expiry_warning(&self, reservation: &Reservation) {
        let task = ScheduledTask::new(
            reservation.id,
            TaskKind::ExpiryWarning,
            reservation.expires_at - self.policy.warning_lead,
        );
        if let Err(e) = self.store.schedule_task(&task).await {
            warn!("Could not schedule expiry warning for reservation {}: {}", reservation.id, e);
        }
    }

    async fn report_outcome(&self, driver_id: Uuid, response_time: Option<f64>, confirmed: bool) {
        if let Err(e) = self.ranking.record_reservation_outcome(driver_id, response_time, confirmed).await {
            error!("Failed to record reservation outcome for driver {}: {}", driver_id, e);
        }
    }
}

/// Seats the superseded hold gives back to `trip_id`
fn seats_returned(previous: Option<&Reservation>, trip_id: Uuid) -> i32 {
    previous.filter(|p| p.trip_id == trip_id).map_or(0, |p| p.seat_count)
}

/// `returned` counts seats a superseded hold on the same trip is about to free
fn check_bookable(trip: &Trip, passenger_id: Uuid, seat_count: i32, returned: i32) -> CoreResult<()> {
    if trip.driver_id == passenger_id {
        return Err(CoreError::Validation("drivers cannot reserve seats on their own trip".to_string()));
    }
    if !trip.is_active() {
        return Err(CoreError::Validation(format!("trip {} is {}", trip.id, trip.status.as_str())));
    }
    if trip.available_seats + returned < seat_count {
        return Err(CoreError::Conflict(format!(
            "trip {} has {} seat(s) left, {} requested",
            trip.id, trip.available_seats + returned, seat_count
        )));
    }
    Ok(())
}
