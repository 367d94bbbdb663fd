//! Event status sync and seat availability queries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::ports::Stores;

/// Counts from one status sync pass.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EventSyncReport {
    pub activated: u64,
    pub ended: u64,
}

/// Seat snapshot for the availability endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SeatAvailability {
    pub event_id: Uuid,
    pub available_seats: i32,
    pub total_seats: i32,
    pub is_full: bool,
}

pub struct EventService {
    stores: Stores,
}

impl EventService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Moves events through Upcoming, Active and Ended according to
    /// their date window. Idempotent on any cadence.
    pub async fn sync_statuses(&self, now: DateTime<Utc>) -> Result<EventSyncReport, AppError> {
        let activated = self.stores.events.activate_started(now).await?;
        let ended = self.stores.events.end_elapsed(now).await?;

        if activated > 0 || ended > 0 {
            tracing::info!(
                "Event status sync: {} activated, {} ended",
                activated,
                ended
            );
        }
        Ok(EventSyncReport { activated, ended })
    }

    pub async fn seat_availability(&self, id: Uuid) -> Result<SeatAvailability, AppError> {
        let event = self
            .stores
            .events
            .get(id)
            .await
            .map_err(|e| AppError::lookup_failed(e, "event", id))?;

        Ok(SeatAvailability {
            event_id: event.id,
            available_seats: event.available_seats,
            total_seats: event.total_seats,
            is_full: event.is_full(),
        })
    }
}
