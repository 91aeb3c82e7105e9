use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;
use ridepool_core::{Clock, CoreError, CoreResult, KeyGuard, KeyedLocks, TripRepository};
use ridepool_shared::SeatLedgerEntry;

/// New availability after applying `delta`, clamped to `[0, total]`
pub fn clamp_available(available: i32, total: i32, delta: i32) -> i32 {
    available.saturating_add(delta).clamp(0, total.max(0))
}

/// Per-trip seat bookkeeping. All writes for a trip go through the trip's lock.
pub struct SeatLedger {
    trips: Arc<dyn TripRepository>,
    locks: Arc<KeyedLocks>,
    clock: Arc<dyn Clock>,
}

impl SeatLedger {
    /// `locks` must be the same trip lock set the reservation state machine uses
    pub fn new(trips: Arc<dyn TripRepository>, locks: Arc<KeyedLocks>, clock: Arc<dyn Clock>) -> Self {
        Self { trips, locks, clock }
    }

    pub fn locks(&self) -> &Arc<KeyedLocks> {
        &self.locks
    }

    /// Signed adjustment: negative reserves, positive releases.
    /// Never fails on exhaustion; the result is clamped.
    pub async fn adjust_seats(&self, trip_id: Uuid, delta: i32) -> CoreResult<SeatLedgerEntry> {
        let guard = self.locks.lock(trip_id).await;
        self.adjust_locked(&guard, delta).await
    }

    /// Same as `adjust_seats` for a caller already holding the trip lock
    pub async fn adjust_locked(&self, guard: &KeyGuard, delta: i32) -> CoreResult<SeatLedgerEntry> {
        let trip_id = guard.key();
        let trip = self.trips.get_trip(trip_id).await?
            .ok_or_else(|| CoreError::not_found("trip", trip_id))?;

        let available = clamp_available(trip.available_seats, trip.total_seats, delta);
        if i64::from(available) != i64::from(trip.available_seats) + i64::from(delta) {
            warn!(
                "Seat adjustment on trip {} clamped: {} {:+} -> {}",
                trip_id, trip.available_seats, delta, available
            );
        }

        let entry = SeatLedgerEntry {
            trip_id,
            total_seats: trip.total_seats,
            available_seats: available,
            reserved_seats: trip.total_seats - available,
            updated_at: self.clock.now(),
        };
        self.trips.write_seat_counts(&entry).await?;

        debug!("Trip {} seats: {} available, {} reserved", trip_id, entry.available_seats, entry.reserved_seats);
        Ok(entry)
    }

    /// Current counts. Rebuilds and stores the cached entry from the trip when missing.
    pub async fn get_availability(&self, trip_id: Uuid) -> CoreResult<SeatLedgerEntry> {
        if let Some(entry) = self.trips.get_ledger_entry(trip_id).await? {
            return Ok(entry);
        }

        let guard = self.locks.lock(trip_id).await;
        // Another caller may have materialized it while we waited
        if let Some(entry) = self.trips.get_ledger_entry(guard.key()).await? {
            return Ok(entry);
        }
        let trip = self.trips.get_trip(trip_id).await?
            .ok_or_else(|| CoreError::not_found("trip", trip_id))?;

        let entry = SeatLedgerEntry::from_trip(&trip, self.clock.now());
        self.trips.write_seat_counts(&entry).await?;
        debug!("Materialized seat ledger entry for trip {}", trip_id);
        Ok(entry)
    }
}
