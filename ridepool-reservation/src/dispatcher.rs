use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;
use ridepool_core::{NotificationRequest, NotificationService, UserRepository};
use ridepool_shared::{DomainEvent, NotificationType};

/// Outbound queue the state machines publish committed transitions to
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: DomainEvent) {
        debug!("Emitting {} for trip {}", event.name(), event.trip_id());
        if let Err(e) = self.tx.send(event) {
            warn!("Event dispatcher is gone, dropping {}", e.0.name());
        }
    }
}

/// One notification the core wants delivered to a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub recipient: Uuid,
    pub notification_type: NotificationType,
    pub trip_id: Option<Uuid>,
    pub reservation_id: Option<Uuid>,
}

impl Notice {
    fn new(recipient: Uuid, notification_type: NotificationType, event: &DomainEvent) -> Self {
        Self {
            recipient,
            notification_type,
            trip_id: Some(event.trip_id()),
            reservation_id: event.reservation_id(),
        }
    }
}

/// Decide who hears about an event, and with which notification type
pub fn notices_for(event: &DomainEvent) -> Vec<Notice> {
    match event {
        DomainEvent::ReservationCreated { driver_id, .. } => {
            vec![Notice::new(*driver_id, NotificationType::NewReservation, event)]
        }
        DomainEvent::ReservationConfirmed { passenger_id, .. } => {
            vec![Notice::new(*passenger_id, NotificationType::ReservationConfirmed, event)]
        }
        DomainEvent::ReservationCancelled { driver_id, passenger_id, cancelled_by, .. } => {
            let recipient = if cancelled_by == passenger_id { *driver_id } else { *passenger_id };
            vec![Notice::new(recipient, NotificationType::ReservationCancelled, event)]
        }
        DomainEvent::ReservationExpired { passenger_id, .. } => {
            vec![Notice::new(*passenger_id, NotificationType::ReservationExpired, event)]
        }
        DomainEvent::ReservationExpiringSoon { passenger_id, .. } => {
            vec![Notice::new(*passenger_id, NotificationType::ReservationExpiringSoon, event)]
        }
        DomainEvent::TripCancelled { passenger_ids, .. } => passenger_ids
            .iter()
            .map(|p| Notice::new(*p, NotificationType::TripCancelled, event))
            .collect(),
        DomainEvent::ReviewRequested { passenger_id, .. } => {
            vec![Notice::new(*passenger_id, NotificationType::ReviewRequest, event)]
        }
        DomainEvent::TripCompleted { .. } => Vec::new(),
    }
}

/// Turns domain events into notification requests. Delivery failures are logged and dropped.
pub struct EventDispatcher {
    users: Arc<dyn UserRepository>,
    notifier: Arc<dyn NotificationService>,
}

impl EventDispatcher {
    pub fn new(users: Arc<dyn UserRepository>, notifier: Arc<dyn NotificationService>) -> Self {
        Self { users, notifier }
    }

    /// Returns how many notifications were accepted
    pub async fn dispatch(&self, event: &DomainEvent) -> usize {
        let mut delivered = 0;

        for notice in notices_for(event) {
            let user = match self.users.get_user(notice.recipient).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    warn!("No Telegram account for user {}, skipping {}", notice.recipient, notice.notification_type.as_str());
                    continue;
                }
                Err(e) => {
                    warn!("User lookup for {} failed: {}", notice.recipient, e);
                    continue;
                }
            };

            let request = NotificationRequest {
                recipient_telegram_id: user.telegram_id,
                notification_type: notice.notification_type,
                related_trip_id: notice.trip_id,
                related_reservation_id: notice.reservation_id,
            };

            match self.notifier.request_notification(&request).await {
                Ok(true) => delivered += 1,
                Ok(false) => debug!("Notifier declined {} for user {}", notice.notification_type.as_str(), notice.recipient),
                Err(e) => warn!("Failed to request {} for user {}: {}", notice.notification_type.as_str(), notice.recipient, e),
            }
        }

        delivered
    }

    /// Drain events until the channel closes or shutdown is signalled
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<DomainEvent>, mut shutdown: watch::Receiver<bool>) {
        info!("Event dispatcher started");

        loop {
            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => {
                        self.dispatch(&event).await;
                    }
                    None => break,
                },
                _ = shutdown.changed() => {
                    // Flush what was already committed before stopping
                    while let Ok(event) = events.try_recv() {
                        self.dispatch(&event).await;
                    }
                    break;
                }
            }
        }

        info!("Event dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_cancellation_notifies_the_other_party() {
        let (driver, passenger, trip, reservation) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let by_passenger = DomainEvent::ReservationCancelled {
            reservation_id: reservation,
            trip_id: trip,
            driver_id: driver,
            passenger_id: passenger,
            cancelled_by: passenger,
        };
        assert_eq!(notices_for(&by_passenger)[0].recipient, driver);

        let by_driver = DomainEvent::ReservationCancelled {
            reservation_id: reservation,
            trip_id: trip,
            driver_id: driver,
            passenger_id: passenger,
            cancelled_by: driver,
        };
        let notices = notices_for(&by_driver);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].recipient, passenger);
        assert_eq!(notices[0].reservation_id, Some(reservation));
    }

    #[test]
    fn test_created_goes_to_driver() {
        let driver = Uuid::new_v4();
        let event = DomainEvent::ReservationCreated {
            reservation_id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            driver_id: driver,
            passenger_id: Uuid::new_v4(),
            seat_count: 1,
            expires_at: Utc::now(),
        };
        assert_eq!(notices_for(&event), vec![Notice::new(driver, NotificationType::NewReservation, &event)]);
    }

    #[test]
    fn test_trip_cancelled_fans_out() {
        let passengers = vec![Uuid::new_v4(), Uuid::new_v4()];
        let event = DomainEvent::TripCancelled {
            trip_id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            passenger_ids: passengers.clone(),
        };
        let recipients: Vec<Uuid> = notices_for(&event).into_iter().map(|n| n.recipient).collect();
        assert_eq!(recipients, passengers);
    }

    #[test]
    fn test_completion_is_silent() {
        let event = DomainEvent::TripCompleted { trip_id: Uuid::new_v4(), driver_id: Uuid::new_v4() };
        assert!(notices_for(&event).is_empty());
    }
}
