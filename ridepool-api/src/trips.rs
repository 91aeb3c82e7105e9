use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use ridepool_reservation::TripCancellation;
use ridepool_shared::{NewTrip, SeatLedgerEntry, Trip};

use crate::actor::Actor;
use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    pub origin: String,
    pub destination: String,
    pub departure_start: DateTime<Utc>,
    pub departure_end: DateTime<Utc>,
    pub total_seats: i32,
}

#[derive(Debug, Deserialize)]
pub struct AdjustSeatsRequest {
    /// Negative takes seats off sale, positive puts them back
    pub delta: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", post(create_trip))
        .route("/v1/trips/{id}/cancel", post(cancel_trip))
        .route("/v1/trips/{id}/complete", post(complete_trip))
        .route("/v1/trips/{id}/availability", get(get_availability))
        .route("/v1/trips/{id}/seats", post(adjust_seats))
        .route("/v1/drivers/{id}/trips", get(list_driver_trips))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/trips
/// Publish a trip as the calling driver
pub async fn create_trip(
    State(state): State<AppState>,
    Actor(driver_id): Actor,
    Json(req): Json<CreateTripRequest>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let trip = state.market.trips.create_trip(NewTrip {
        driver_id,
        origin: req.origin,
        destination: req.destination,
        departure_start: req.departure_start,
        departure_end: req.departure_end,
        total_seats: req.total_seats,
    }).await?;

    Ok((StatusCode::CREATED, Json(trip)))
}

/// GET /v1/drivers/{id}/trips
pub async fn list_driver_trips(
    State(state): State<AppState>,
    Path(driver_id): Path<Uuid>,
) -> Result<Json<Vec<Trip>>, AppError> {
    Ok(Json(state.market.trips.list_driver_trips(driver_id).await?))
}

/// POST /v1/trips/{id}/cancel
pub async fn cancel_trip(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<TripCancellation>, AppError> {
    Ok(Json(state.market.trips.cancel_trip(trip_id, actor_id).await?))
}

/// POST /v1/trips/{id}/complete
pub async fn complete_trip(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.market.trips.complete_trip(trip_id, actor_id).await?))
}

/// GET /v1/trips/{id}/availability
pub async fn get_availability(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<SeatLedgerEntry>, AppError> {
    Ok(Json(state.market.ledger.get_availability(trip_id).await?))
}

/// POST /v1/trips/{id}/seats
/// Manual correction by the driver, e.g. a rider who booked offline
pub async fn adjust_seats(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    Path(trip_id): Path<Uuid>,
    Json(req): Json<AdjustSeatsRequest>,
) -> Result<Json<SeatLedgerEntry>, AppError> {
    Ok(Json(state.market.trips.adjust_seats(trip_id, actor_id, req.delta).await?))
}
