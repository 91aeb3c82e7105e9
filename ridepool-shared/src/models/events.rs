use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Notification kinds the core may request. Templates live with the bot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    NewReservation,
    ReservationConfirmed,
    ReservationCancelled,
    ReservationExpired,
    ReservationExpiringSoon,
    TripCancelled,
    ReviewRequest,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::NewReservation => "NEW_RESERVATION",
            NotificationType::ReservationConfirmed => "RESERVATION_CONFIRMED",
            NotificationType::ReservationCancelled => "RESERVATION_CANCELLED",
            NotificationType::ReservationExpired => "RESERVATION_EXPIRED",
            NotificationType::ReservationExpiringSoon => "RESERVATION_EXPIRING_SOON",
            NotificationType::TripCancelled => "TRIP_CANCELLED",
            NotificationType::ReviewRequest => "REVIEW_REQUEST",
        }
    }
}

/// Facts emitted by the reservation and trip state machines after a transition commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ReservationCreated {
        reservation_id: Uuid,
        trip_id: Uuid,
        driver_id: Uuid,
        passenger_id: Uuid,
        seat_count: i32,
        expires_at: DateTime<Utc>,
    },
    ReservationConfirmed {
        reservation_id: Uuid,
        trip_id: Uuid,
        driver_id: Uuid,
        passenger_id: Uuid,
        confirmed_by: Uuid,
    },
    ReservationCancelled {
        reservation_id: Uuid,
        trip_id: Uuid,
        driver_id: Uuid,
        passenger_id: Uuid,
        cancelled_by: Uuid,
    },
    ReservationExpired {
        reservation_id: Uuid,
        trip_id: Uuid,
        driver_id: Uuid,
        passenger_id: Uuid,
    },
    ReservationExpiringSoon {
        reservation_id: Uuid,
        trip_id: Uuid,
        passenger_id: Uuid,
        expires_at: DateTime<Utc>,
    },
    TripCancelled {
        trip_id: Uuid,
        driver_id: Uuid,
        passenger_ids: Vec<Uuid>,
    },
    TripCompleted {
        trip_id: Uuid,
        driver_id: Uuid,
    },
    ReviewRequested {
        reservation_id: Uuid,
        trip_id: Uuid,
        driver_id: Uuid,
        passenger_id: Uuid,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::ReservationCreated { .. } => "reservation_created",
            DomainEvent::ReservationConfirmed { .. } => "reservation_confirmed",
            DomainEvent::ReservationCancelled { .. } => "reservation_cancelled",
            DomainEvent::ReservationExpired { .. } => "reservation_expired",
            DomainEvent::ReservationExpiringSoon { .. } => "reservation_expiring_soon",
            DomainEvent::TripCancelled { .. } => "trip_cancelled",
            DomainEvent::TripCompleted { .. } => "trip_completed",
            DomainEvent::ReviewRequested { .. } => "review_requested",
        }
    }

    pub fn trip_id(&self) -> Uuid {
        match self {
            DomainEvent::ReservationCreated { trip_id, .. }
            | DomainEvent::ReservationConfirmed { trip_id, .. }
            | DomainEvent::ReservationCancelled { trip_id, .. }
            | DomainEvent::ReservationExpired { trip_id, .. }
            | DomainEvent::ReservationExpiringSoon { trip_id, .. }
            | DomainEvent::TripCancelled { trip_id, .. }
            | DomainEvent::TripCompleted { trip_id, .. }
            | DomainEvent::ReviewRequested { trip_id, .. } => *trip_id,
        }
    }

    pub fn reservation_id(&self) -> Option<Uuid> {
        match self {
            DomainEvent::ReservationCreated { reservation_id, .. }
            | DomainEvent::ReservationConfirmed { reservation_id, .. }
            | DomainEvent::ReservationCancelled { reservation_id, .. }
            | DomainEvent::ReservationExpired { reservation_id, .. }
            | DomainEvent::ReservationExpiringSoon { reservation_id, .. }
            | DomainEvent::ReviewRequested { reservation_id, .. } => Some(*reservation_id),
            DomainEvent::TripCancelled { .. } | DomainEvent::TripCompleted { .. } => None,
        }
    }
}
