//! Postgres implementation of EventStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Event;
use crate::ports::{EventStore, StoreError, StoreResult};

/// Postgres-backed event store. Seat arithmetic happens inside single
/// UPDATE statements so concurrent reservations serialize in the
/// database, not in this process.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn get(&self, id: Uuid) -> StoreResult<Event> {
        let row = sqlx::query_as::<_, EventRow>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        match row {
            Some(row) => row.into_domain(),
            None => Err(StoreError::NotFound(format!("event {}", id))),
        }
    }

    async fn reserve_seats(&self, id: Uuid, quantity: i32) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET available_seats = available_seats - $2, updated_at = NOW()
            WHERE id = $1 AND available_seats >= $2
            "#,
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_seats(&self, id: Uuid, quantity: i32) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET available_seats = available_seats + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("event {}", id)));
        }
        Ok(())
    }

    async fn activate_started(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET status = 'ACTIVE', updated_at = NOW()
            WHERE status = 'UPCOMING' AND start_date <= $1 AND end_date >= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(result.rows_affected())
    }

    async fn end_elapsed(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET status = 'ENDED', updated_at = NOW()
            WHERE status IN ('UPCOMING', 'ACTIVE') AND end_date < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(result.rows_affected())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    name: String,
    organizer_id: Uuid,
    price: i64,
    total_seats: i32,
    available_seats: i32,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EventRow {
    fn into_domain(self) -> StoreResult<Event> {
        let status = self
            .status
            .parse()
            .map_err(|e| StoreError::Backend(format!("event {}: {}", self.id, e)))?;

        Ok(Event {
            id: self.id,
            name: self.name,
            organizer_id: self.organizer_id,
            price: self.price,
            total_seats: self.total_seats,
            available_seats: self.available_seats,
            start_date: self.start_date,
            end_date: self.end_date,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
