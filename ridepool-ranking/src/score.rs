//! Driver ranking formula: four bucketed contributions summed to at most 100.
//!
//! | component      | points |
//! |----------------|--------|
//! | response time  | 0-40   |
//! | response rate  | 0-30   |
//! | online status  | 0-20   |
//! | experience     | 0-10   |

use ridepool_shared::DriverMetrics;

pub const MAX_SCORE: f64 = 100.0;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Faster average response earns more; no data yet sits in the middle
pub fn response_time_points(avg_response_time: Option<f64>) -> f64 {
    match avg_response_time {
        None => 20.0,
        Some(t) if t <= 60.0 => 40.0,
        Some(t) if t <= 120.0 => 30.0,
        Some(t) if t <= 300.0 => 20.0,
        Some(_) => 10.0,
    }
}

pub fn response_rate_points(response_rate: f64) -> f64 {
    response_rate.clamp(0.0, 100.0) / 100.0 * 30.0
}

pub fn online_points(is_online: bool) -> f64 {
    if is_online { 20.0 } else { 0.0 }
}

pub fn experience_points(total_trips: i32) -> f64 {
    match total_trips {
        n if n >= 50 => 10.0,
        n if n >= 20 => 7.0,
        n if n >= 10 => 5.0,
        n if n >= 5 => 3.0,
        _ => 0.0,
    }
}

fn raw_ranking_score(metrics: &DriverMetrics, is_online: bool) -> f64 {
    let total = response_time_points(metrics.avg_response_time)
        + response_rate_points(metrics.response_rate)
        + online_points(is_online)
        + experience_points(metrics.total_trips);
    total.min(MAX_SCORE)
}

/// The authoritative score stored on `DriverMetrics::ranking_score`
pub fn ranking_score(metrics: &DriverMetrics, is_online: bool) -> f64 {
    round2(raw_ranking_score(metrics, is_online))
}

fn raw_reliability(metrics: &DriverMetrics) -> f64 {
    if metrics.total_trips <= 0 {
        return 100.0;
    }
    let ratio = metrics.cancelled_trips_with_passengers as f64 / metrics.total_trips as f64;
    100.0 * (1.0 - ratio.clamp(0.0, 1.0))
}

/// 100 minus the share of trips cancelled with passengers aboard
pub fn reliability_score(metrics: &DriverMetrics) -> f64 {
    round2(raw_reliability(metrics))
}

/// 0-10 from a 1-5 average; unrated drivers get the midpoint
pub fn rating_points(avg_rating: Option<f64>) -> f64 {
    match avg_rating {
        None => 5.0,
        Some(r) => r.clamp(0.0, 5.0) / 5.0 * 10.0,
    }
}

/// Rating- and reliability-aware variant: 80% of the base score plus up to 10 points each
/// for average rating and reliability. Left unrounded so a single cancellation on a long
/// history still moves it.
pub fn adjusted_score(metrics: &DriverMetrics, is_online: bool) -> f64 {
    let total = raw_ranking_score(metrics, is_online) * 0.8
        + rating_points(metrics.avg_rating)
        + raw_reliability(metrics) / 100.0 * 10.0;

    total.min(MAX_SCORE)
}
