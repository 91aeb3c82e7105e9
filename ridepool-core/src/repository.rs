use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use ridepool_shared::{
    DriverMetrics, Reservation, ReservationStatus, ScheduledTask, SeatLedgerEntry, Trip,
    TripStatus, User,
};

use crate::CoreResult;

/// Repository trait for trip and seat-ledger data access
#[async_trait]
pub trait TripRepository: Send + Sync {
    /// Insert a new trip together with its initial ledger entry
    async fn insert_trip(&self, trip: &Trip, ledger: &SeatLedgerEntry) -> CoreResult<()>;

    async fn get_trip(&self, id: Uuid) -> CoreResult<Option<Trip>>;

    async fn list_trips_by_driver(&self, driver_id: Uuid) -> CoreResult<Vec<Trip>>;

    /// ACTIVE trips whose departure window ended at or before `now`
    async fn list_lapsed_trips(&self, now: DateTime<Utc>) -> CoreResult<Vec<Trip>>;

    async fn update_trip_status(
        &self,
        id: Uuid,
        status: TripStatus,
        now: DateTime<Utc>,
    ) -> CoreResult<()>;

    /// Write `trip.available_seats` and the ledger entry in one transaction.
    /// Fails with `NotFound` if the trip row is gone.
    async fn write_seat_counts(&self, entry: &SeatLedgerEntry) -> CoreResult<()>;

    async fn get_ledger_entry(&self, trip_id: Uuid) -> CoreResult<Option<SeatLedgerEntry>>;
}

/// Repository trait for reservation data access
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn insert_reservation(&self, reservation: &Reservation) -> CoreResult<()>;

    async fn get_reservation(&self, id: Uuid) -> CoreResult<Option<Reservation>>;

    async fn update_reservation(&self, reservation: &Reservation) -> CoreResult<()>;

    /// First PENDING reservation of the passenger with `expires_at > now`
    async fn find_active_for_passenger(
        &self,
        passenger_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<Reservation>>;

    async fn list_for_trip(
        &self,
        trip_id: Uuid,
        statuses: &[ReservationStatus],
    ) -> CoreResult<Vec<Reservation>>;

    /// PENDING reservations with `expires_at < now`
    async fn list_due_for_expiry(&self, now: DateTime<Utc>) -> CoreResult<Vec<Reservation>>;
}

/// Repository trait for per-driver aggregates
#[async_trait]
pub trait MetricsRepository: Send + Sync {
    async fn get_metrics(&self, driver_id: Uuid) -> CoreResult<Option<DriverMetrics>>;

    async fn save_metrics(&self, metrics: &DriverMetrics) -> CoreResult<()>;
}

/// Repository trait for durable one-shot timers
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn schedule_task(&self, task: &ScheduledTask) -> CoreResult<()>;

    /// Incomplete tasks with `due_at <= now`, oldest first
    async fn list_due_tasks(&self, now: DateTime<Utc>) -> CoreResult<Vec<ScheduledTask>>;

    async fn complete_task(&self, id: Uuid, now: DateTime<Utc>) -> CoreResult<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>>;

    async fn upsert_user(&self, user: &User) -> CoreResult<()>;
}

/// Everything the marketplace reads and writes through one handle
pub trait Datastore:
    TripRepository + ReservationRepository + MetricsRepository + TaskRepository + UserRepository
{
}

impl<T> Datastore for T where
    T: TripRepository + ReservationRepository + MetricsRepository + TaskRepository + UserRepository
{
}
