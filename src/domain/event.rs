//! Event domain entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::transaction::StatusParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Upcoming,
    Active,
    Ended,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "UPCOMING",
            EventStatus::Active => "ACTIVE",
            EventStatus::Ended => "ENDED",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPCOMING" => Ok(EventStatus::Upcoming),
            "ACTIVE" => Ok(EventStatus::Active),
            "ENDED" => Ok(EventStatus::Ended),
            other => Err(StatusParseError::new(other)),
        }
    }
}

/// Event with seat inventory. `available_seats` is only ever mutated
/// through the store's reserve/release operations.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub organizer_id: Uuid,
    pub price: i64,
    pub total_seats: i32,
    pub available_seats: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(
        name: impl Into<String>,
        organizer_id: Uuid,
        price: i64,
        total_seats: i32,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            organizer_id,
            price,
            total_seats,
            available_seats: total_seats,
            start_date,
            end_date,
            status: EventStatus::Upcoming,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_full(&self) -> bool {
        self.available_seats <= 0
    }

    /// Status the event should carry at `now`, derived from its dates.
    pub fn status_at(&self, now: DateTime<Utc>) -> EventStatus {
        if self.end_date < now {
            EventStatus::Ended
        } else if self.start_date <= now {
            EventStatus::Active
        } else {
            EventStatus::Upcoming
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_at_follows_dates() {
        let now = Utc::now();
        let event = Event::new(
            "Jakarta Jazz Night",
            Uuid::new_v4(),
            250_000,
            100,
            now + Duration::days(1),
            now + Duration::days(2),
        );

        assert_eq!(event.status_at(now), EventStatus::Upcoming);
        assert_eq!(event.status_at(now + Duration::days(1)), EventStatus::Active);
        assert_eq!(event.status_at(now + Duration::days(3)), EventStatus::Ended);
    }

    #[test]
    fn test_new_event_starts_with_all_seats() {
        let now = Utc::now();
        let event = Event::new("Workshop", Uuid::new_v4(), 50_000, 30, now, now);
        assert_eq!(event.available_seats, event.total_seats);
        assert!(!event.is_full());
    }
}
