use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use ridepool_core::CoreError;
use ridepool_ranking::DriverRanking;

use crate::actor::Actor;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PresenceRequest {
    pub is_online: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub reservation_id: Uuid,
    pub rating: u8,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/drivers/{id}/ranking", get(get_ranking))
        .route("/v1/drivers/{id}/presence", post(record_presence))
        .route("/v1/drivers/{id}/reviews", post(submit_review))
}

/// GET /v1/drivers/{id}/ranking
pub async fn get_ranking(
    State(state): State<AppState>,
    Path(driver_id): Path<Uuid>,
) -> Result<Json<DriverRanking>, AppError> {
    Ok(Json(state.market.ranking.driver_ranking(driver_id).await?))
}

/// POST /v1/drivers/{id}/presence
/// Heartbeat from the driver's own client
pub async fn record_presence(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    Path(driver_id): Path<Uuid>,
    Json(req): Json<PresenceRequest>,
) -> Result<Json<DriverRanking>, AppError> {
    if actor_id != driver_id {
        return Err(CoreError::Conflict("drivers can only report their own presence".to_string()).into());
    }

    state.market.ranking.record_presence(driver_id, req.is_online).await?;
    Ok(Json(state.market.ranking.driver_ranking(driver_id).await?))
}

/// POST /v1/drivers/{id}/reviews
pub async fn submit_review(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    Path(driver_id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<DriverRanking>, AppError> {
    let reservation = state.market.reservations.get(req.reservation_id).await?;
    let trip = state.market.trips.get_trip(reservation.trip_id).await?;
    if trip.driver_id != driver_id {
        return Err(CoreError::Validation(format!(
            "reservation {} was not a ride with driver {}",
            req.reservation_id, driver_id
        )).into());
    }

    let reviewed = state.market.reservations
        .review_driver(req.reservation_id, actor_id, req.rating)
        .await?;

    Ok(Json(state.market.ranking.driver_ranking(reviewed).await?))
}
