use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use ridepool_core::{CoreResult, MetricsRepository, UserRepository};
use ridepool_shared::pii::Masked;
use ridepool_shared::{DriverMetrics, User};

use crate::{db_err, PgStore};

#[derive(sqlx::FromRow)]
struct MetricsRow {
    driver_id: Uuid,
    avg_response_time: Option<f64>,
    response_rate: f64,
    total_reservations: i32,
    confirmed_reservations: i32,
    response_samples: i32,
    total_trips: i32,
    cancelled_trips: i32,
    cancelled_trips_with_passengers: i32,
    avg_rating: Option<f64>,
    total_reviews: i32,
    reliability_score: f64,
    ranking_score: f64,
    last_updated: DateTime<Utc>,
}

impl From<MetricsRow> for DriverMetrics {
    fn from(row: MetricsRow) -> Self {
        DriverMetrics {
            driver_id: row.driver_id,
            avg_response_time: row.avg_response_time,
            response_rate: row.response_rate,
            total_reservations: row.total_reservations,
            confirmed_reservations: row.confirmed_reservations,
            response_samples: row.response_samples,
            total_trips: row.total_trips,
            cancelled_trips: row.cancelled_trips,
            cancelled_trips_with_passengers: row.cancelled_trips_with_passengers,
            avg_rating: row.avg_rating,
            total_reviews: row.total_reviews,
            reliability_score: row.reliability_score,
            ranking_score: row.ranking_score,
            last_updated: row.last_updated,
        }
    }
}

#[async_trait]
impl MetricsRepository for PgStore {
    async fn get_metrics(&self, driver_id: Uuid) -> CoreResult<Option<DriverMetrics>> {
        let row = sqlx::query_as::<_, MetricsRow>(
            r#"
            SELECT driver_id, avg_response_time, response_rate, total_reservations, confirmed_reservations,
                   response_samples, total_trips, cancelled_trips, cancelled_trips_with_passengers,
                   avg_rating, total_reviews, reliability_score, ranking_score, last_updated
            FROM driver_metrics WHERE driver_id = $1
            "#,
        )
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(DriverMetrics::from))
    }

    async fn save_metrics(&self, m: &DriverMetrics) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO driver_metrics (driver_id, avg_response_time, response_rate, total_reservations, confirmed_reservations,
                                        response_samples, total_trips, cancelled_trips, cancelled_trips_with_passengers,
                                        avg_rating, total_reviews, reliability_score, ranking_score, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (driver_id) DO UPDATE
            SET avg_response_time = EXCLUDED.avg_response_time,
                response_rate = EXCLUDED.response_rate,
                total_reservations = EXCLUDED.total_reservations,
                confirmed_reservations = EXCLUDED.confirmed_reservations,
                response_samples = EXCLUDED.response_samples,
                total_trips = EXCLUDED.total_trips,
                cancelled_trips = EXCLUDED.cancelled_trips,
                cancelled_trips_with_passengers = EXCLUDED.cancelled_trips_with_passengers,
                avg_rating = EXCLUDED.avg_rating,
                total_reviews = EXCLUDED.total_reviews,
                reliability_score = EXCLUDED.reliability_score,
                ranking_score = EXCLUDED.ranking_score,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(m.driver_id)
        .bind(m.avg_response_time)
        .bind(m.response_rate)
        .bind(m.total_reservations)
        .bind(m.confirmed_reservations)
        .bind(m.response_samples)
        .bind(m.total_trips)
        .bind(m.cancelled_trips)
        .bind(m.cancelled_trips_with_passengers)
        .bind(m.avg_rating)
        .bind(m.total_reviews)
        .bind(m.reliability_score)
        .bind(m.ranking_score)
        .bind(m.last_updated)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        let row: Option<(Uuid, i64, String)> =
            sqlx::query_as("SELECT id, telegram_id, display_name FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(row.map(|(id, telegram_id, display_name)| User {
            id,
            telegram_id: Masked(telegram_id),
            display_name,
        }))
    }

    async fn upsert_user(&self, user: &User) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, telegram_id, display_name) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET telegram_id = EXCLUDED.telegram_id, display_name = EXCLUDED.display_name
            "#,
        )
        .bind(user.id)
        .bind(*user.telegram_id.expose())
        .bind(&user.display_name)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}
