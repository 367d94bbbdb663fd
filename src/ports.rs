//! Store contracts consumed by the services.
//!
//! Each backing system (Postgres, the in-memory store, the image host)
//! implements these traits; services only ever see trait objects, so
//! the same engine runs against either backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Event, Promotion, Transaction, TransactionStatus, User};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Seat ledger plus event lifecycle updates.
///
/// `reserve_seats` must be a single conditional write against the
/// backend: it decrements only while `available_seats >= quantity` and
/// reports whether it won, so concurrent callers can never jointly
/// oversell. `release_seats` is the unconditional inverse.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Event>;

    async fn reserve_seats(&self, id: Uuid, quantity: i32) -> StoreResult<bool>;

    async fn release_seats(&self, id: Uuid, quantity: i32) -> StoreResult<()>;

    /// Flips UPCOMING events whose window contains `now` to ACTIVE.
    /// Returns the number of rows changed.
    async fn activate_started(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Flips UPCOMING/ACTIVE events whose end has passed to ENDED.
    async fn end_elapsed(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Points ledger. Same atomicity contract as the seat ledger.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<User>;

    async fn reserve_points(&self, id: Uuid, amount: i64) -> StoreResult<bool>;

    async fn release_points(&self, id: Uuid, amount: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait PromotionStore: Send + Sync {
    async fn get_by_code(&self, code: &str) -> StoreResult<Option<Promotion>>;

    /// Conditionally bumps `current_uses` while under `max_uses`.
    /// Returns false when the limit (or deactivation) lost the race.
    async fn increment_uses(&self, id: Uuid) -> StoreResult<bool>;

    /// Deactivates active promotions past `valid_until`. Returns the
    /// number of rows changed.
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Clone)]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    pub total: i64,
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persists a new transaction. Fails with `Conflict` when the user
    /// already holds an active registration for the event; the backend
    /// enforces that uniqueness, not the caller.
    async fn insert(&self, tx: &Transaction) -> StoreResult<Transaction>;

    async fn get(&self, id: Uuid) -> StoreResult<Transaction>;

    async fn find_active(&self, user_id: Uuid, event_id: Uuid)
        -> StoreResult<Option<Transaction>>;

    /// Atomic status compare-and-set: moves the row to `to` only if its
    /// current status is in `from`, returning the updated row. `None`
    /// means another caller claimed the transition first (or the row
    /// does not exist); the caller must not release any holds.
    async fn claim_transition(
        &self,
        id: Uuid,
        from: &[TransactionStatus],
        to: TransactionStatus,
    ) -> StoreResult<Option<Transaction>>;

    /// Compare-and-set from WaitingPayment to WaitingConfirmation,
    /// recording the proof URL and the confirmation deadline.
    async fn attach_payment_proof(
        &self,
        id: Uuid,
        proof_url: &str,
        confirmation_deadline: DateTime<Utc>,
    ) -> StoreResult<Option<Transaction>>;

    async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> StoreResult<TransactionPage>;

    /// WaitingPayment rows whose payment deadline precedes `now`.
    async fn find_expired_payments(&self, now: DateTime<Utc>) -> StoreResult<Vec<Transaction>>;

    /// WaitingConfirmation rows whose confirmation deadline precedes `now`.
    async fn find_expired_confirmations(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Transaction>>;

    async fn count_by_status(&self) -> StoreResult<Vec<(TransactionStatus, i64)>>;
}

#[derive(Error, Debug)]
pub enum UploadError {
    /// The payload itself is unusable (wrong type, oversized, corrupt).
    #[error("image rejected: {0}")]
    Rejected(String),

    /// The image host failed; the payload may be fine.
    #[error("upload failed: {0}")]
    Failed(String),
}

/// Durable image hosting for payment proofs.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Pushes a data-URI or URL payload and returns the hosted URL.
    async fn upload(&self, data: &str) -> Result<String, UploadError>;
}

/// Bundle of data-store handles injected into the services.
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventStore>,
    pub users: Arc<dyn UserStore>,
    pub promotions: Arc<dyn PromotionStore>,
    pub transactions: Arc<dyn TransactionStore>,
}
