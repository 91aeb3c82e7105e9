use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;

use crate::ParseStatusError;

/// Reservation status. Only PENDING has outgoing transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }

    /// Statuses whose seats are still taken out of the trip's availability
    pub fn holds_seats(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Confirmed)
    }
}

impl FromStr for ReservationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReservationStatus::Pending),
            "CONFIRMED" => Ok(ReservationStatus::Confirmed),
            "CANCELLED" => Ok(ReservationStatus::Cancelled),
            "EXPIRED" => Ok(ReservationStatus::Expired),
            other => Err(ParseStatusError { kind: "reservation status", value: other.to_string() }),
        }
    }
}

/// A soft, time-boxed hold on `seat_count` seats of a trip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub passenger_id: Uuid,
    pub seat_count: i32,
    pub status: ReservationStatus,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub chat_id: Option<Uuid>,
    /// Set once the passenger has rated the driver for this ride
    pub reviewed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(trip_id: Uuid, passenger_id: Uuid, seat_count: i32, now: DateTime<Utc>, hold: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            passenger_id,
            seat_count,
            status: ReservationStatus::Pending,
            reserved_at: now,
            expires_at: now + hold,
            confirmed_at: None,
            chat_id: None,
            reviewed_at: None,
            updated_at: now,
        }
    }

    /// PENDING and still inside its hold window
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expires_at > now
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn update_status(&mut self, status: ReservationStatus, now: DateTime<Utc>) {
        self.status = status;
        if status == ReservationStatus::Confirmed {
            self.confirmed_at = Some(now);
        }
        self.updated_at = now;
    }
}
