use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use ridepool_core::{CoreError, CoreResult, ReservationRepository, TaskRepository};
use ridepool_shared::{Reservation, ReservationStatus, ScheduledTask, TaskKind};

use crate::{db_err, PgStore};

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    trip_id: Uuid,
    passenger_id: Uuid,
    seat_count: i32,
    status: String,
    reserved_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    chat_id: Option<Uuid>,
    reviewed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = CoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Reservation {
            id: row.id,
            trip_id: row.trip_id,
            passenger_id: row.passenger_id,
            seat_count: row.seat_count,
            status: row.status.parse::<ReservationStatus>().map_err(CoreError::internal)?,
            reserved_at: row.reserved_at,
            expires_at: row.expires_at,
            confirmed_at: row.confirmed_at,
            chat_id: row.chat_id,
            reviewed_at: row.reviewed_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    reservation_id: Uuid,
    kind: String,
    due_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TaskRow> for ScheduledTask {
    type Error = CoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(ScheduledTask {
            id: row.id,
            reservation_id: row.reservation_id,
            kind: row.kind.parse::<TaskKind>().map_err(CoreError::internal)?,
            due_at: row.due_at,
            completed_at: row.completed_at,
        })
    }
}

const RESERVATION_COLUMNS: &str = "id, trip_id, passenger_id, seat_count, status, reserved_at, expires_at, confirmed_at, chat_id, reviewed_at, updated_at";

fn into_reservations(rows: Vec<ReservationRow>) -> CoreResult<Vec<Reservation>> {
    rows.into_iter().map(Reservation::try_from).collect()
}

#[async_trait]
impl ReservationRepository for PgStore {
    async fn insert_reservation(&self, reservation: &Reservation) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reservations (id, trip_id, passenger_id, seat_count, status, reserved_at, expires_at, confirmed_at, chat_id, reviewed_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(reservation.id)
        .bind(reservation.trip_id)
        .bind(reservation.passenger_id)
        .bind(reservation.seat_count)
        .bind(reservation.status.as_str())
        .bind(reservation.reserved_at)
        .bind(reservation.expires_at)
        .bind(reservation.confirmed_at)
        .bind(reservation.chat_id)
        .bind(reservation.reviewed_at)
        .bind(reservation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_reservation(&self, id: Uuid) -> CoreResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Reservation::try_from).transpose()
    }

    async fn update_reservation(&self, reservation: &Reservation) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE reservations SET status = $2, confirmed_at = $3, chat_id = $4, reviewed_at = $5, updated_at = $6 WHERE id = $1",
        )
        .bind(reservation.id)
        .bind(reservation.status.as_str())
        .bind(reservation.confirmed_at)
        .bind(reservation.chat_id)
        .bind(reservation.reviewed_at)
        .bind(reservation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("reservation", reservation.id));
        }
        Ok(())
    }

    async fn find_active_for_passenger(&self, passenger_id: Uuid, now: DateTime<Utc>) -> CoreResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE passenger_id = $1 AND status = 'PENDING' AND expires_at > $2 ORDER BY reserved_at LIMIT 1",
            RESERVATION_COLUMNS
        ))
        .bind(passenger_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Reservation::try_from).transpose()
    }

    async fn list_for_trip(&self, trip_id: Uuid, statuses: &[ReservationStatus]) -> CoreResult<Vec<Reservation>> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE trip_id = $1 AND status = ANY($2) ORDER BY reserved_at",
            RESERVATION_COLUMNS
        ))
        .bind(trip_id)
        .bind(statuses)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        into_reservations(rows)
    }

    async fn list_due_for_expiry(&self, now: DateTime<Utc>) -> CoreResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE status = 'PENDING' AND expires_at < $1 ORDER BY expires_at",
            RESERVATION_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        into_reservations(rows)
    }
}

#[async_trait]
impl TaskRepository for PgStore {
    async fn schedule_task(&self, task: &ScheduledTask) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO scheduled_tasks (id, reservation_id, kind, due_at, completed_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(task.id)
        .bind(task.reservation_id)
        .bind(task.kind.as_str())
        .bind(task.due_at)
        .bind(task.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn list_due_tasks(&self, now: DateTime<Utc>) -> CoreResult<Vec<ScheduledTask>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            "SELECT id, reservation_id, kind, due_at, completed_at FROM scheduled_tasks WHERE completed_at IS NULL AND due_at <= $1 ORDER BY due_at",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(ScheduledTask::try_from).collect()
    }

    async fn complete_task(&self, id: Uuid, now: DateTime<Utc>) -> CoreResult<()> {
        sqlx::query("UPDATE scheduled_tasks SET completed_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }
}
