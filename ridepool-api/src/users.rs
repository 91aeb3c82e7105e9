use axum::{
    extract::{Path, State},
    routing::put,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use ridepool_core::CoreError;
use ridepool_shared::pii::Masked;
use ridepool_shared::User;

use crate::actor::Actor;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertUserRequest {
    pub telegram_id: Masked<i64>,
    pub display_name: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/users/{id}", put(upsert_user))
}

/// PUT /v1/users/{id}
/// Link a user to the Telegram chat notifications are delivered to
pub async fn upsert_user(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpsertUserRequest>,
) -> Result<Json<User>, AppError> {
    if actor_id != user_id {
        return Err(CoreError::Conflict("users can only update their own profile".to_string()).into());
    }
    if req.display_name.trim().is_empty() {
        return Err(CoreError::Validation("display name is required".to_string()).into());
    }

    let user = User {
        id: user_id,
        telegram_id: req.telegram_id,
        display_name: req.display_name,
    };
    state.users.upsert_user(&user).await?;
    info!("User {} linked to Telegram {}", user_id, user.telegram_id);

    Ok(Json(user))
}
