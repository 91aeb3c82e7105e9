use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Rolling per-driver aggregates. Written only by the ranking engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverMetrics {
    pub driver_id: Uuid,
    /// Seconds; `None` until the first measured response
    pub avg_response_time: Option<f64>,
    /// 0-100, confirmed / total reservations
    pub response_rate: f64,
    pub total_reservations: i32,
    pub confirmed_reservations: i32,
    /// Number of responses folded into `avg_response_time`
    pub response_samples: i32,
    pub total_trips: i32,
    pub cancelled_trips: i32,
    pub cancelled_trips_with_passengers: i32,
    pub avg_rating: Option<f64>,
    pub total_reviews: i32,
    pub reliability_score: f64,
    pub ranking_score: f64,
    pub last_updated: DateTime<Utc>,
}

impl DriverMetrics {
    pub fn new(driver_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            driver_id,
            avg_response_time: None,
            response_rate: 0.0,
            total_reservations: 0,
            confirmed_reservations: 0,
            response_samples: 0,
            total_trips: 0,
            cancelled_trips: 0,
            cancelled_trips_with_passengers: 0,
            avg_rating: None,
            total_reviews: 0,
            reliability_score: 100.0,
            ranking_score: 0.0,
            last_updated: now,
        }
    }
}
