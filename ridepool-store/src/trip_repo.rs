use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use ridepool_core::{CoreError, CoreResult, TripRepository};
use ridepool_shared::{SeatLedgerEntry, Trip, TripStatus};

use crate::{db_err, PgStore};

#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    driver_id: Uuid,
    origin: String,
    destination: String,
    departure_start: DateTime<Utc>,
    departure_end: DateTime<Utc>,
    total_seats: i32,
    available_seats: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TripRow> for Trip {
    type Error = CoreError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        Ok(Trip {
            id: row.id,
            driver_id: row.driver_id,
            origin: row.origin,
            destination: row.destination,
            departure_start: row.departure_start,
            departure_end: row.departure_end,
            total_seats: row.total_seats,
            available_seats: row.available_seats,
            status: row.status.parse::<TripStatus>().map_err(CoreError::internal)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    trip_id: Uuid,
    total_seats: i32,
    available_seats: i32,
    reserved_seats: i32,
    updated_at: DateTime<Utc>,
}

impl From<LedgerRow> for SeatLedgerEntry {
    fn from(row: LedgerRow) -> Self {
        SeatLedgerEntry {
            trip_id: row.trip_id,
            total_seats: row.total_seats,
            available_seats: row.available_seats,
            reserved_seats: row.reserved_seats,
            updated_at: row.updated_at,
        }
    }
}

const TRIP_COLUMNS: &str = "id, driver_id, origin, destination, departure_start, departure_end, total_seats, available_seats, status, created_at, updated_at";

fn into_trips(rows: Vec<TripRow>) -> CoreResult<Vec<Trip>> {
    rows.into_iter().map(Trip::try_from).collect()
}

async fn upsert_ledger(
    conn: &mut sqlx::PgConnection,
    entry: &SeatLedgerEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO seat_ledger (trip_id, total_seats, available_seats, reserved_seats, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (trip_id) DO UPDATE
        SET available_seats = EXCLUDED.available_seats,
            reserved_seats = EXCLUDED.reserved_seats,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(entry.trip_id)
    .bind(entry.total_seats)
    .bind(entry.available_seats)
    .bind(entry.reserved_seats)
    .bind(entry.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl TripRepository for PgStore {
    async fn insert_trip(&self, trip: &Trip, ledger: &SeatLedgerEntry) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO trips (id, driver_id, origin, destination, departure_start, departure_end, total_seats, available_seats, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(trip.id)
        .bind(trip.driver_id)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.departure_start)
        .bind(trip.departure_end)
        .bind(trip.total_seats)
        .bind(trip.available_seats)
        .bind(trip.status.as_str())
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        upsert_ledger(&mut *tx, ledger).await.map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_trip(&self, id: Uuid) -> CoreResult<Option<Trip>> {
        let row = sqlx::query_as::<_, TripRow>(&format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(Trip::try_from).transpose()
    }

    async fn list_trips_by_driver(&self, driver_id: Uuid) -> CoreResult<Vec<Trip>> {
        let rows = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {} FROM trips WHERE driver_id = $1 ORDER BY departure_start",
            TRIP_COLUMNS
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        into_trips(rows)
    }

    async fn list_lapsed_trips(&self, now: DateTime<Utc>) -> CoreResult<Vec<Trip>> {
        let rows = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {} FROM trips WHERE status = 'ACTIVE' AND departure_end <= $1",
            TRIP_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        into_trips(rows)
    }

    async fn update_trip_status(&self, id: Uuid, status: TripStatus, now: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query("UPDATE trips SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("trip", id));
        }
        Ok(())
    }

    async fn write_seat_counts(&self, entry: &SeatLedgerEntry) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query("UPDATE trips SET available_seats = $2, updated_at = $3 WHERE id = $1")
            .bind(entry.trip_id)
            .bind(entry.available_seats)
            .bind(entry.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        // Dropping the transaction rolls it back
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("trip", entry.trip_id));
        }

        upsert_ledger(&mut *tx, entry).await.map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_ledger_entry(&self, trip_id: Uuid) -> CoreResult<Option<SeatLedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerRow>(
            "SELECT trip_id, total_seats, available_seats, reserved_seats, updated_at FROM seat_ledger WHERE trip_id = $1",
        )
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(SeatLedgerEntry::from))
    }
}
