use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;
use ridepool_core::{CoreError, CoreResult, NotificationRequest, NotificationService, PresenceTracker};
use ridepool_shared::Presence;

/// List the Telegram bot pops notification requests from
pub const NOTIFICATION_OUTBOX_KEY: &str = "notifications:outbox";

/// Presence entries vanish if a client stops sending heartbeats for this long
const PRESENCE_TTL_SECONDS: i64 = 3600;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

fn redis_err(err: redis::RedisError) -> CoreError {
    CoreError::internal(format!("redis: {}", err))
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        // Fail fast on a bad url rather than on the first heartbeat
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Connected to Redis");
        Ok(Self { client })
    }

    fn presence_key(user_id: Uuid) -> String {
        format!("presence:{}", user_id)
    }
}

fn parse_presence(fields: HashMap<String, String>) -> Presence {
    let is_online = fields.get("online").map(|v| v == "1").unwrap_or(false);
    let last_seen = fields.get("last_seen")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

    Presence { is_online, last_seen }
}

#[async_trait]
impl PresenceTracker for RedisClient {
    async fn presence(&self, user_id: Uuid) -> CoreResult<Presence> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(redis_err)?;
        let fields: HashMap<String, String> = conn.hgetall(Self::presence_key(user_id)).await.map_err(redis_err)?;
        Ok(parse_presence(fields))
    }

    async fn record_heartbeat(&self, user_id: Uuid, is_online: bool, at: DateTime<Utc>) -> CoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(redis_err)?;
        let key = Self::presence_key(user_id);
        let online = if is_online { "1" } else { "0" };

        let _: () = redis::pipe()
            .atomic()
            .hset(&key, "online", online)
            .hset(&key, "last_seen", at.timestamp_millis())
            .expire(&key, PRESENCE_TTL_SECONDS)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;

        Ok(())
    }
}

#[async_trait]
impl NotificationService for RedisClient {
    async fn request_notification(&self, request: &NotificationRequest) -> CoreResult<bool> {
        let payload = serde_json::to_string(request).map_err(CoreError::internal)?;
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(redis_err)?;
        let depth: i64 = conn.rpush(NOTIFICATION_OUTBOX_KEY, payload).await.map_err(redis_err)?;
        debug!(
            "Queued {} notification for {} (outbox depth {})",
            request.notification_type.as_str(), request.recipient_telegram_id, depth
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_presence_defaults_to_offline() {
        assert_eq!(parse_presence(HashMap::new()), Presence::default());
    }

    #[test]
    fn test_parse_presence_reads_fields() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap();
        let mut fields = HashMap::new();
        fields.insert("online".to_string(), "1".to_string());
        fields.insert("last_seen".to_string(), at.timestamp_millis().to_string());

        let presence = parse_presence(fields);

        assert!(presence.is_online);
        assert_eq!(presence.last_seen, Some(at));
    }
}
