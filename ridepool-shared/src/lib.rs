pub mod models;
pub mod pii;

pub use models::chat::{Chat, ChatStatus};
pub use models::events::{DomainEvent, NotificationType};
pub use models::metrics::DriverMetrics;
pub use models::reservation::{Reservation, ReservationStatus};
pub use models::task::{ScheduledTask, TaskKind};
pub use models::trip::{NewTrip, SeatLedgerEntry, Trip, TripStatus};
pub use models::user::{Presence, User};

/// Returned when a persisted status string does not name a known variant.
#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}
