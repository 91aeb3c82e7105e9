pub mod dispatcher;
pub mod manager;
pub mod marketplace;
pub mod scheduler;
pub mod trips;

pub use dispatcher::{EventDispatcher, Notice, Outbox};
pub use manager::ReservationManager;
pub use marketplace::Marketplace;
pub use scheduler::{ExpiryScheduler, SweepReport};
pub use trips::{TripCancellation, TripController};

use ridepool_core::CoreError;

/// A ledger failure inside a reservation transition means the trip row disappeared
/// under us. That is a data-integrity problem, not a caller error.
pub(crate) fn integrity(err: CoreError) -> CoreError {
    match err {
        CoreError::NotFound(msg) => CoreError::Internal(format!("seat ledger lost its trip: {}", msg)),
        other => other,
    }
}
