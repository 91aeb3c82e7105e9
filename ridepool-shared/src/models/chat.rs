use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::ParseStatusError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatStatus {
    Active,
    Archived,
    /// History stays visible, new messages are refused
    ReadOnly,
}

impl ChatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatStatus::Active => "ACTIVE",
            ChatStatus::Archived => "ARCHIVED",
            ChatStatus::ReadOnly => "READ_ONLY",
        }
    }
}

impl FromStr for ChatStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ChatStatus::Active),
            "ARCHIVED" => Ok(ChatStatus::Archived),
            "READ_ONLY" => Ok(ChatStatus::ReadOnly),
            other => Err(ParseStatusError { kind: "chat status", value: other.to_string() }),
        }
    }
}

/// Negotiation channel between a passenger and a driver, one per reservation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    pub passenger_id: Uuid,
    pub status: ChatStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
