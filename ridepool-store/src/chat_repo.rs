use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;
use ridepool_core::{ChatService, CoreError, CoreResult};
use ridepool_shared::ChatStatus;

use crate::{db_err, PgStore};

/// Chat lifecycle rows. Message bodies are stored by the messaging service, not here.
#[async_trait]
impl ChatService for PgStore {
    async fn create_chat(&self, reservation_id: Uuid, trip_id: Uuid, driver_id: Uuid, passenger_id: Uuid) -> CoreResult<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO chats (id, reservation_id, trip_id, driver_id, passenger_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            "#,
        )
        .bind(id)
        .bind(reservation_id)
        .bind(trip_id)
        .bind(driver_id)
        .bind(passenger_id)
        .bind(ChatStatus::Active.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(id)
    }

    async fn set_chat_status(&self, chat_id: Uuid, status: ChatStatus) -> CoreResult<()> {
        let result = sqlx::query("UPDATE chats SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(chat_id)
            .bind(status.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("chat", chat_id));
        }
        Ok(())
    }
}
