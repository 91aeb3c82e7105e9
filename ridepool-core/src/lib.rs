pub mod clock;
pub mod collaborators;
pub mod locks;
pub mod policy;
pub mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{ChatService, NotificationRequest, NotificationService, PresenceTracker};
pub use locks::{KeyGuard, KeyedLocks};
pub use policy::ReservationPolicy;
pub use repository::{
    Datastore, MetricsRepository, ReservationRepository, TaskRepository, TripRepository,
    UserRepository,
};

/// Error taxonomy shared by every marketplace operation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Referenced trip, reservation or driver does not exist
    #[error("Not found: {0}")]
    NotFound(String),
    /// Request violates a precondition (self-booking, inactive trip, malformed window)
    #[error("Validation failed: {0}")]
    Validation(String),
    /// State machine precondition violated (seats, status, actor, expired hold)
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Datastore or data-integrity failure
    #[error("Internal service error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        CoreError::NotFound(format!("{} {}", kind, id))
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        CoreError::Internal(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
