use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::ParseStatusError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    /// "Your hold is about to lapse" nudge to the passenger
    ExpiryWarning,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ExpiryWarning => "EXPIRY_WARNING",
        }
    }
}

impl FromStr for TaskKind {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXPIRY_WARNING" => Ok(TaskKind::ExpiryWarning),
            other => Err(ParseStatusError { kind: "task kind", value: other.to_string() }),
        }
    }
}

/// Durable one-shot timer row, picked up by the periodic sweep
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledTask {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub kind: TaskKind,
    pub due_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScheduledTask {
    pub fn new(reservation_id: Uuid, kind: TaskKind, due_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reservation_id,
            kind,
            due_at,
            completed_at: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.completed_at.is_none() && self.due_at <= now
    }
}
