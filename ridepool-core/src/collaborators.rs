use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use ridepool_shared::pii::Masked;
use ridepool_shared::{ChatStatus, NotificationType, Presence};

use crate::CoreResult;

/// Chat lifecycle owned by the messaging service. Message content never passes through here.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn create_chat(
        &self,
        reservation_id: Uuid,
        trip_id: Uuid,
        driver_id: Uuid,
        passenger_id: Uuid,
    ) -> CoreResult<Uuid>;

    async fn set_chat_status(&self, chat_id: Uuid, status: ChatStatus) -> CoreResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRequest {
    pub recipient_telegram_id: Masked<i64>,
    pub notification_type: NotificationType,
    pub related_trip_id: Option<Uuid>,
    pub related_reservation_id: Option<Uuid>,
}

/// Bot-side delivery. Rate limiting, opt-in and templating belong to the implementor.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Returns whether the message was accepted for delivery
    async fn request_notification(&self, request: &NotificationRequest) -> CoreResult<bool>;
}

/// Online status and last-seen timestamps fed by client heartbeats
#[async_trait]
pub trait PresenceTracker: Send + Sync {
    async fn presence(&self, user_id: Uuid) -> CoreResult<Presence>;

    async fn record_heartbeat(
        &self,
        user_id: Uuid,
        is_online: bool,
        at: DateTime<Utc>,
    ) -> CoreResult<()>;
}
