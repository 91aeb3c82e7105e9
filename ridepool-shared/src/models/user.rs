use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::pii::Masked;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub telegram_id: Masked<i64>,
    pub display_name: String,
}

/// Liveness signal reported by the client heartbeat
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Presence {
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}
