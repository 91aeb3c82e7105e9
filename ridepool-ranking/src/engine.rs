use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use ridepool_core::{Clock, CoreError, CoreResult, KeyedLocks, MetricsRepository, PresenceTracker};
use ridepool_shared::DriverMetrics;

use crate::score;

/// Ranking view served to search and driver profile screens
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DriverRanking {
    pub driver_id: Uuid,
    pub ranking_score: f64,
    pub adjusted_score: f64,
    pub avg_response_time: Option<f64>,
    pub response_rate: f64,
    pub total_trips: i32,
    pub online_status: bool,
}

/// Owns every write to `DriverMetrics`. Updates for one driver are serialized so the
/// running averages never lose an update.
pub struct RankingEngine {
    metrics: Arc<dyn MetricsRepository>,
    presence: Arc<dyn PresenceTracker>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl RankingEngine {
    pub fn new(
        metrics: Arc<dyn MetricsRepository>,
        presence: Arc<dyn PresenceTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            metrics,
            presence,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    /// Fold one reservation outcome into the driver's aggregates.
    /// Not idempotent: callers report each outcome exactly once.
    pub async fn record_reservation_outcome(
        &self,
        driver_id: Uuid,
        response_time_seconds: Option<f64>,
        confirmed: bool,
    ) -> CoreResult<DriverMetrics> {
        self.update(driver_id, |m| {
            m.total_reservations += 1;
            if confirmed {
                m.confirmed_reservations += 1;
            }
            m.response_rate = m.confirmed_reservations as f64 / m.total_reservations as f64 * 100.0;

            if let Some(seconds) = response_time_seconds {
                let n = m.response_samples as f64;
                m.avg_response_time = Some(match m.avg_response_time {
                    Some(old) => (old * n + seconds) / (n + 1.0),
                    None => seconds,
                });
                m.response_samples += 1;
            }
        })
        .await
    }

    pub async fn record_trip_cancellation(
        &self,
        driver_id: Uuid,
        had_passengers: bool,
        passenger_count: i32,
    ) -> CoreResult<DriverMetrics> {
        let metrics = self.update(driver_id, |m| {
            m.cancelled_trips += 1;
            if had_passengers {
                m.cancelled_trips_with_passengers += 1;
            }
        })
        .await?;

        info!(
            "Driver {} cancelled a trip ({} seats affected), reliability now {}",
            driver_id, passenger_count, metrics.reliability_score
        );
        Ok(metrics)
    }

    pub async fn record_trip_created(&self, driver_id: Uuid) -> CoreResult<DriverMetrics> {
        self.update(driver_id, |m| m.total_trips += 1).await
    }

    /// Fold a 1-5 star review into the running average rating
    pub async fn record_review(&self, driver_id: Uuid, rating: u8) -> CoreResult<DriverMetrics> {
        if !(1..=5).contains(&rating) {
            return Err(CoreError::Validation(format!("rating must be 1-5, got {}", rating)));
        }

        self.update(driver_id, |m| {
            let n = m.total_reviews as f64;
            m.avg_rating = Some(match m.avg_rating {
                Some(old) => (old * n + rating as f64) / (n + 1.0),
                None => rating as f64,
            });
            m.total_reviews += 1;
        })
        .await
    }

    /// Recompute the stored score after a presence change
    pub async fn refresh(&self, driver_id: Uuid) -> CoreResult<DriverMetrics> {
        self.update(driver_id, |_| {}).await
    }

    /// Store a heartbeat and re-score with the new online status
    pub async fn record_presence(&self, driver_id: Uuid, is_online: bool) -> CoreResult<DriverMetrics> {
        self.presence.record_heartbeat(driver_id, is_online, self.clock.now()).await?;
        self.refresh(driver_id).await
    }

    /// Live ranking with the driver's current online status
    pub async fn driver_ranking(&self, driver_id: Uuid) -> CoreResult<DriverRanking> {
        let metrics = self.metrics.get_metrics(driver_id).await?
            .unwrap_or_else(|| DriverMetrics::new(driver_id, self.clock.now()));
        let online = self.is_online(driver_id).await;

        Ok(DriverRanking {
            driver_id,
            ranking_score: score::ranking_score(&metrics, online),
            adjusted_score: score::adjusted_score(&metrics, online),
            avg_response_time: metrics.avg_response_time,
            response_rate: metrics.response_rate,
            total_trips: metrics.total_trips,
            online_status: online,
        })
    }

    async fn is_online(&self, driver_id: Uuid) -> bool {
        match self.presence.presence(driver_id).await {
            Ok(p) => p.is_online,
            Err(e) => {
                warn!("Presence lookup for driver {} failed, scoring as offline: {}", driver_id, e);
                false
            }
        }
    }

    async fn update<F>(&self, driver_id: Uuid, apply: F) -> CoreResult<DriverMetrics>
    where
        F: FnOnce(&mut DriverMetrics),
    {
        let _guard = self.locks.lock(driver_id).await;
        let now = self.clock.now();

        // 1. Load, creating lazily on first event
        let mut metrics = self.metrics.get_metrics(driver_id).await?
            .unwrap_or_else(|| DriverMetrics::new(driver_id, now));

        // 2. Apply the event
        apply(&mut metrics);

        // 3. Recompute derived scores
        let online = self.is_online(driver_id).await;
        metrics.reliability_score = score::reliability_score(&metrics);
        metrics.ranking_score = score::ranking_score(&metrics, online);
        metrics.last_updated = now;

        self.metrics.save_metrics(&metrics).await?;
        Ok(metrics)
    }
}
