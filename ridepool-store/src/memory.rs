use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use ridepool_core::{
    ChatService, CoreError, CoreResult, MetricsRepository, NotificationRequest,
    NotificationService, PresenceTracker, ReservationRepository, TaskRepository, TripRepository,
    UserRepository,
};
use ridepool_shared::{
    Chat, ChatStatus, DriverMetrics, Presence, Reservation, ReservationStatus, ScheduledTask,
    SeatLedgerEntry, Trip, TripStatus, User,
};

#[derive(Default)]
struct MemoryState {
    trips: HashMap<Uuid, Trip>,
    ledger: HashMap<Uuid, SeatLedgerEntry>,
    reservations: HashMap<Uuid, Reservation>,
    metrics: HashMap<Uuid, DriverMetrics>,
    tasks: HashMap<Uuid, ScheduledTask>,
    users: HashMap<Uuid, User>,
    chats: HashMap<Uuid, Chat>,
    presence: HashMap<Uuid, Presence>,
}

/// In-process datastore used for local runs and tests.
/// Every method takes the state lock once, so each call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_chat(&self, id: Uuid) -> Option<Chat> {
        self.state.read().await.chats.get(&id).cloned()
    }

    /// Drop the cached ledger row, leaving the trip untouched
    pub async fn evict_ledger_entry(&self, trip_id: Uuid) {
        self.state.write().await.ledger.remove(&trip_id);
    }

    /// Remove a trip row outright (simulates a record vanishing mid-flight)
    pub async fn remove_trip(&self, trip_id: Uuid) {
        let mut state = self.state.write().await;
        state.trips.remove(&trip_id);
        state.ledger.remove(&trip_id);
    }

    pub async fn list_tasks(&self) -> Vec<ScheduledTask> {
        self.state.read().await.tasks.values().cloned().collect()
    }
}

#[async_trait]
impl TripRepository for MemoryStore {
    async fn insert_trip(&self, trip: &Trip, ledger: &SeatLedgerEntry) -> CoreResult<()> {
        let mut state = self.state.write().await;
        state.trips.insert(trip.id, trip.clone());
        state.ledger.insert(trip.id, ledger.clone());
        Ok(())
    }

    async fn get_trip(&self, id: Uuid) -> CoreResult<Option<Trip>> {
        Ok(self.state.read().await.trips.get(&id).cloned())
    }

    async fn list_trips_by_driver(&self, driver_id: Uuid) -> CoreResult<Vec<Trip>> {
        let state = self.state.read().await;
        let mut trips: Vec<Trip> = state.trips.values()
            .filter(|t| t.driver_id == driver_id)
            .cloned()
            .collect();
        trips.sort_by_key(|t| t.departure_start);
        Ok(trips)
    }

    async fn list_lapsed_trips(&self, now: DateTime<Utc>) -> CoreResult<Vec<Trip>> {
        let state = self.state.read().await;
        Ok(state.trips.values()
            .filter(|t| t.is_active() && t.window_elapsed(now))
            .cloned()
            .collect())
    }

    async fn update_trip_status(&self, id: Uuid, status: TripStatus, now: DateTime<Utc>) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let trip = state.trips.get_mut(&id).ok_or_else(|| CoreError::not_found("trip", id))?;
        trip.status = status;
        trip.updated_at = now;
        Ok(())
    }

    async fn write_seat_counts(&self, entry: &SeatLedgerEntry) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let trip = state.trips.get_mut(&entry.trip_id)
            .ok_or_else(|| CoreError::not_found("trip", entry.trip_id))?;
        trip.available_seats = entry.available_seats;
        trip.updated_at = entry.updated_at;
        state.ledger.insert(entry.trip_id, entry.clone());
        Ok(())
    }

    async fn get_ledger_entry(&self, trip_id: Uuid) -> CoreResult<Option<SeatLedgerEntry>> {
        Ok(self.state.read().await.ledger.get(&trip_id).cloned())
    }
}

#[async_trait]
impl ReservationRepository for MemoryStore {
    async fn insert_reservation(&self, reservation: &Reservation) -> CoreResult<()> {
        self.state.write().await.reservations.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn get_reservation(&self, id: Uuid) -> CoreResult<Option<Reservation>> {
        Ok(self.state.read().await.reservations.get(&id).cloned())
    }

    async fn update_reservation(&self, reservation: &Reservation) -> CoreResult<()> {
        let mut state = self.state.write().await;
        match state.reservations.get_mut(&reservation.id) {
            Some(existing) => {
                *existing = reservation.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("reservation", reservation.id)),
        }
    }

    async fn find_active_for_passenger(&self, passenger_id: Uuid, now: DateTime<Utc>) -> CoreResult<Option<Reservation>> {
        let state = self.state.read().await;
        Ok(state.reservations.values()
            .filter(|r| r.passenger_id == passenger_id && r.is_active_at(now))
            .min_by_key(|r| r.reserved_at)
            .cloned())
    }

    async fn list_for_trip(&self, trip_id: Uuid, statuses: &[ReservationStatus]) -> CoreResult<Vec<Reservation>> {
        let state = self.state.read().await;
        let mut reservations: Vec<Reservation> = state.reservations.values()
            .filter(|r| r.trip_id == trip_id && statuses.contains(&r.status))
            .cloned()
            .collect();
        reservations.sort_by_key(|r| r.reserved_at);
        Ok(reservations)
    }

    async fn list_due_for_expiry(&self, now: DateTime<Utc>) -> CoreResult<Vec<Reservation>> {
        let state = self.state.read().await;
        let mut due: Vec<Reservation> = state.reservations.values()
            .filter(|r| r.status == ReservationStatus::Pending && r.expires_at < now)
            .cloned()
            .collect();
        due.sort_by_key(|r| r.expires_at);
        Ok(due)
    }
}

#[async_trait]
impl MetricsRepository for MemoryStore {
    async fn get_metrics(&self, driver_id: Uuid) -> CoreResult<Option<DriverMetrics>> {
        Ok(self.state.read().await.metrics.get(&driver_id).cloned())
    }

    async fn save_metrics(&self, metrics: &DriverMetrics) -> CoreResult<()> {
        self.state.write().await.metrics.insert(metrics.driver_id, metrics.clone());
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn schedule_task(&self, task: &ScheduledTask) -> CoreResult<()> {
        self.state.write().await.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn list_due_tasks(&self, now: DateTime<Utc>) -> CoreResult<Vec<ScheduledTask>> {
        let state = self.state.read().await;
        let mut due: Vec<ScheduledTask> = state.tasks.values()
            .filter(|t| t.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|t| t.due_at);
        Ok(due)
    }

    async fn complete_task(&self, id: Uuid, now: DateTime<Utc>) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&id).ok_or_else(|| CoreError::not_found("task", id))?;
        task.completed_at = Some(now);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn upsert_user(&self, user: &User) -> CoreResult<()> {
        self.state.write().await.users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl ChatService for MemoryStore {
    async fn create_chat(&self, reservation_id: Uuid, trip_id: Uuid, driver_id: Uuid, passenger_id: Uuid) -> CoreResult<Uuid> {
        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4(),
            reservation_id,
            trip_id,
            driver_id,
            passenger_id,
            status: ChatStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let id = chat.id;
        self.state.write().await.chats.insert(id, chat);
        Ok(id)
    }

    async fn set_chat_status(&self, chat_id: Uuid, status: ChatStatus) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let chat = state.chats.get_mut(&chat_id).ok_or_else(|| CoreError::not_found("chat", chat_id))?;
        chat.status = status;
        chat.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl PresenceTracker for MemoryStore {
    async fn presence(&self, user_id: Uuid) -> CoreResult<Presence> {
        Ok(self.state.read().await.presence.get(&user_id).copied().unwrap_or_default())
    }

    async fn record_heartbeat(&self, user_id: Uuid, is_online: bool, at: DateTime<Utc>) -> CoreResult<()> {
        self.state.write().await.presence.insert(user_id, Presence {
            is_online,
            last_seen: Some(at),
        });
        Ok(())
    }
}

/// Notification sink that keeps every request. Optionally refuses delivery.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: RwLock<Vec<NotificationRequest>>,
    failing: std::sync::atomic::AtomicBool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl NotificationService for MemoryNotifier {
    async fn request_notification(&self, request: &NotificationRequest) -> CoreResult<bool> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CoreError::Internal("notifier unavailable".to_string()));
        }
        self.sent.write().await.push(request.clone());
        Ok(true)
    }
}
