use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use ridepool_core::CoreError;
use ridepool_shared::Reservation;

use crate::actor::Actor;
use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub trip_id: Uuid,
    pub seat_count: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponsivenessResponse {
    pub reservation_id: Uuid,
    pub driver_responsive: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(create_reservation))
        .route("/v1/reservations/{id}/confirm", post(confirm_reservation))
        .route("/v1/reservations/{id}/cancel", post(cancel_reservation))
        .route("/v1/reservations/{id}/driver-responsive", get(driver_responsive))
        .route("/v1/passengers/{id}/reservation", get(active_reservation))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/reservations
/// Hold seats for the calling passenger. Replaces their previous live hold.
pub async fn create_reservation(
    State(state): State<AppState>,
    Actor(passenger_id): Actor,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    let reservation = state.market.reservations
        .create(req.trip_id, passenger_id, req.seat_count)
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// POST /v1/reservations/{id}/confirm
pub async fn confirm_reservation(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.market.reservations.confirm(reservation_id, actor_id).await?))
}

/// POST /v1/reservations/{id}/cancel
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.market.reservations.cancel(reservation_id, actor_id).await?))
}

/// GET /v1/passengers/{id}/reservation
/// The passenger's live hold, or null. Only the passenger may look.
pub async fn active_reservation(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    Path(passenger_id): Path<Uuid>,
) -> Result<Json<Option<Reservation>>, AppError> {
    if actor_id != passenger_id {
        return Err(CoreError::Conflict("passengers can only view their own reservation".to_string()).into());
    }
    Ok(Json(state.market.reservations.get_active_reservation(passenger_id).await?))
}

/// GET /v1/reservations/{id}/driver-responsive
pub async fn driver_responsive(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ResponsivenessResponse>, AppError> {
    let driver_responsive = state.market.reservations.is_driver_responsive(reservation_id).await?;
    Ok(Json(ResponsivenessResponse { reservation_id, driver_responsive }))
}
