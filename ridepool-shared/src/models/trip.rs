use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::ParseStatusError;

/// Trip lifecycle status. Monotonic: a trip never leaves COMPLETED or CANCELLED.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Active,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "ACTIVE",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for TripStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(TripStatus::Active),
            "COMPLETED" => Ok(TripStatus::Completed),
            "CANCELLED" => Ok(TripStatus::Cancelled),
            other => Err(ParseStatusError { kind: "trip status", value: other.to_string() }),
        }
    }
}

/// Driver input for publishing a trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrip {
    pub driver_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_start: DateTime<Utc>,
    pub departure_end: DateTime<Utc>,
    pub total_seats: i32,
}

/// A published trip. `available_seats` is only ever written through the seat ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_start: DateTime<Utc>,
    pub departure_end: DateTime<Utc>,
    pub total_seats: i32,
    pub available_seats: i32,
    pub status: TripStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(input: NewTrip, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver_id: input.driver_id,
            origin: input.origin,
            destination: input.destination,
            departure_start: input.departure_start,
            departure_end: input.departure_end,
            total_seats: input.total_seats,
            available_seats: input.total_seats,
            status: TripStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn reserved_seats(&self) -> i32 {
        self.total_seats - self.available_seats
    }

    pub fn is_active(&self) -> bool {
        self.status == TripStatus::Active
    }

    /// True once the departure window has closed
    pub fn window_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.departure_end <= now
    }
}

/// Denormalized seat counters for one trip.
/// `reserved_seats + available_seats == total_seats` always holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatLedgerEntry {
    pub trip_id: Uuid,
    pub total_seats: i32,
    pub available_seats: i32,
    pub reserved_seats: i32,
    pub updated_at: DateTime<Utc>,
}

impl SeatLedgerEntry {
    pub fn from_trip(trip: &Trip, now: DateTime<Utc>) -> Self {
        Self {
            trip_id: trip.id,
            total_seats: trip.total_seats,
            available_seats: trip.available_seats,
            reserved_seats: trip.reserved_seats(),
            updated_at: now,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.available_seats >= 0
            && self.available_seats <= self.total_seats
            && self.available_seats + self.reserved_seats == self.total_seats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_trip_starts_fully_available() {
        let now = Utc::now();
        let trip = Trip::new(NewTrip {
            driver_id: Uuid::new_v4(),
            origin: "Tashkent".to_string(),
            destination: "Samarkand".to_string(),
            departure_start: now + Duration::hours(1),
            departure_end: now + Duration::hours(2),
            total_seats: 4,
        }, now);

        assert_eq!(trip.available_seats, 4);
        assert_eq!(trip.reserved_seats(), 0);
        assert!(trip.is_active());
        assert!(!trip.window_elapsed(now));
        assert!(trip.window_elapsed(now + Duration::hours(2)));
        assert!(SeatLedgerEntry::from_trip(&trip, now).is_balanced());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [TripStatus::Active, TripStatus::Completed, TripStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<TripStatus>().unwrap(), status);
        }
        assert!("PAUSED".parse::<TripStatus>().is_err());
    }
}
