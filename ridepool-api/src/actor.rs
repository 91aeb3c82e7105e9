use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// Header the upstream gateway sets after verifying the Telegram identity
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Authenticated user performing the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub Uuid);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts.headers
            .get(ACTOR_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", ACTOR_HEADER)))?;

        Uuid::parse_str(raw.trim())
            .map(Actor)
            .map_err(|_| AppError::Unauthorized(format!("malformed {} header", ACTOR_HEADER)))
    }
}
