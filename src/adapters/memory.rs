//! In-memory implementations of the store contracts.
//!
//! Backs the deterministic test suites and `serve --memory` runs. All
//! state lives behind one mutex, so every conditional update is atomic
//! with respect to concurrent tasks, matching the guarantees the
//! Postgres adapters get from single UPDATE statements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Event, Promotion, Transaction, TransactionStatus, User};
use crate::ports::{
    EventStore, ImageStore, PromotionStore, StoreError, StoreResult, TransactionFilter,
    TransactionPage, TransactionStore, UploadError, UserStore,
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    promotions: HashMap<Uuid, Promotion>,
    transactions: HashMap<Uuid, Transaction>,
}

/// Single-process store backing all four data contracts.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<State>>,
    fail_points_reserve: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.inner.lock().await.users.insert(user.id, user);
    }

    pub async fn insert_event(&self, event: Event) {
        self.inner.lock().await.events.insert(event.id, event);
    }

    pub async fn insert_promotion(&self, promotion: Promotion) {
        self.inner
            .lock()
            .await
            .promotions
            .insert(promotion.id, promotion);
    }

    pub async fn user_points(&self, id: Uuid) -> Option<i64> {
        self.inner.lock().await.users.get(&id).map(|u| u.points)
    }

    pub async fn event_seats(&self, id: Uuid) -> Option<i32> {
        self.inner
            .lock()
            .await
            .events
            .get(&id)
            .map(|e| e.available_seats)
    }

    pub async fn promotion_uses(&self, id: Uuid) -> Option<i32> {
        self.inner
            .lock()
            .await
            .promotions
            .get(&id)
            .map(|p| p.current_uses)
    }

    pub async fn transaction(&self, id: Uuid) -> Option<Transaction> {
        self.inner.lock().await.transactions.get(&id).cloned()
    }

    pub async fn event(&self, id: Uuid) -> Option<Event> {
        self.inner.lock().await.events.get(&id).cloned()
    }

    /// Backdates a payment deadline so deadline-driven paths can be
    /// exercised without waiting out the real window.
    pub async fn set_payment_deadline(&self, id: Uuid, deadline: DateTime<Utc>) {
        if let Some(tx) = self.inner.lock().await.transactions.get_mut(&id) {
            tx.payment_deadline = deadline;
        }
    }

    pub async fn set_confirmation_deadline(&self, id: Uuid, deadline: DateTime<Utc>) {
        if let Some(tx) = self.inner.lock().await.transactions.get_mut(&id) {
            tx.confirmation_deadline = Some(deadline);
        }
    }

    /// Makes the next `reserve_points` call report a lost race.
    pub fn fail_next_points_reserve(&self) {
        self.fail_points_reserve.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Event> {
        self.inner
            .lock()
            .await
            .events
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("event {}", id)))
    }

    async fn reserve_seats(&self, id: Uuid, quantity: i32) -> StoreResult<bool> {
        let mut state = self.inner.lock().await;
        let event = state
            .events
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("event {}", id)))?;

        if event.available_seats < quantity {
            return Ok(false);
        }
        event.available_seats -= quantity;
        event.updated_at = Utc::now();
        Ok(true)
    }

    async fn release_seats(&self, id: Uuid, quantity: i32) -> StoreResult<()> {
        let mut state = self.inner.lock().await;
        let event = state
            .events
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("event {}", id)))?;

        event.available_seats += quantity;
        event.updated_at = Utc::now();
        Ok(())
    }

    async fn activate_started(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.inner.lock().await;
        let mut changed = 0;
        for event in state.events.values_mut() {
            if event.status == crate::domain::EventStatus::Upcoming
                && event.start_date <= now
                && event.end_date >= now
            {
                event.status = crate::domain::EventStatus::Active;
                event.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn end_elapsed(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.inner.lock().await;
        let mut changed = 0;
        for event in state.events.values_mut() {
            if event.status != crate::domain::EventStatus::Ended && event.end_date < now {
                event.status = crate::domain::EventStatus::Ended;
                event.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<User> {
        self.inner
            .lock()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))
    }

    async fn reserve_points(&self, id: Uuid, amount: i64) -> StoreResult<bool> {
        if self.fail_points_reserve.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }

        let mut state = self.inner.lock().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))?;

        if user.points < amount {
            return Ok(false);
        }
        user.points -= amount;
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn release_points(&self, id: Uuid, amount: i64) -> StoreResult<()> {
        let mut state = self.inner.lock().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))?;

        user.points += amount;
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl PromotionStore for MemoryStore {
    async fn get_by_code(&self, code: &str) -> StoreResult<Option<Promotion>> {
        Ok(self
            .inner
            .lock()
            .await
            .promotions
            .values()
            .find(|p| p.code == code)
            .cloned())
    }

    async fn increment_uses(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.inner.lock().await;
        let promotion = state
            .promotions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("promotion {}", id)))?;

        if !promotion.is_active {
            return Ok(false);
        }
        if let Some(max_uses) = promotion.max_uses {
            if promotion.current_uses >= max_uses {
                return Ok(false);
            }
        }
        promotion.current_uses += 1;
        promotion.updated_at = Utc::now();
        Ok(true)
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.inner.lock().await;
        let mut changed = 0;
        for promotion in state.promotions.values_mut() {
            if promotion.is_active && promotion.valid_until < now {
                promotion.is_active = false;
                promotion.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let mut state = self.inner.lock().await;

        let duplicate = state
            .transactions
            .values()
            .any(|t| t.user_id == tx.user_id && t.event_id == tx.event_id && t.status.is_active());
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "active transaction exists for user {} on event {}",
                tx.user_id, tx.event_id
            )));
        }

        state.transactions.insert(tx.id, tx.clone());
        Ok(tx.clone())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Transaction> {
        self.inner
            .lock()
            .await
            .transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("transaction {}", id)))
    }

    async fn find_active(
        &self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> StoreResult<Option<Transaction>> {
        Ok(self
            .inner
            .lock()
            .await
            .transactions
            .values()
            .find(|t| t.user_id == user_id && t.event_id == event_id && t.status.is_active())
            .cloned())
    }

    async fn claim_transition(
        &self,
        id: Uuid,
        from: &[TransactionStatus],
        to: TransactionStatus,
    ) -> StoreResult<Option<Transaction>> {
        let mut state = self.inner.lock().await;
        let Some(tx) = state.transactions.get_mut(&id) else {
            return Ok(None);
        };
        if !from.contains(&tx.status) {
            return Ok(None);
        }
        tx.status = to;
        tx.updated_at = Utc::now();
        Ok(Some(tx.clone()))
    }

    async fn attach_payment_proof(
        &self,
        id: Uuid,
        proof_url: &str,
        confirmation_deadline: DateTime<Utc>,
    ) -> StoreResult<Option<Transaction>> {
        let mut state = self.inner.lock().await;
        let Some(tx) = state.transactions.get_mut(&id) else {
            return Ok(None);
        };
        if tx.status != TransactionStatus::WaitingPayment {
            return Ok(None);
        }
        tx.payment_proof = Some(proof_url.to_string());
        tx.confirmation_deadline = Some(confirmation_deadline);
        tx.status = TransactionStatus::WaitingConfirmation;
        tx.updated_at = Utc::now();
        Ok(Some(tx.clone()))
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> StoreResult<TransactionPage> {
        let state = self.inner.lock().await;
        let mut matching: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let offset = ((filter.page - 1) * filter.limit).max(0) as usize;
        let items = matching
            .into_iter()
            .skip(offset)
            .take(filter.limit.max(0) as usize)
            .collect();

        Ok(TransactionPage { items, total })
    }

    async fn find_expired_payments(&self, now: DateTime<Utc>) -> StoreResult<Vec<Transaction>> {
        let state = self.inner.lock().await;
        let mut due: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::WaitingPayment && t.payment_deadline < now)
            .cloned()
            .collect();
        due.sort_by_key(|t| t.payment_deadline);
        Ok(due)
    }

    async fn find_expired_confirmations(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Transaction>> {
        let state = self.inner.lock().await;
        let mut due: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| {
                t.status == TransactionStatus::WaitingConfirmation
                    && t.confirmation_deadline.is_some_and(|d| d < now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|t| t.confirmation_deadline);
        Ok(due)
    }

    async fn count_by_status(&self) -> StoreResult<Vec<(TransactionStatus, i64)>> {
        let state = self.inner.lock().await;
        let mut counts: HashMap<TransactionStatus, i64> = HashMap::new();
        for tx in state.transactions.values() {
            *counts.entry(tx.status).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

/// Image store that fabricates URLs instead of calling out. Used by
/// tests and `serve --memory`.
#[derive(Clone, Default)]
pub struct MemoryImageStore {
    uploads: Arc<AtomicU64>,
    fail_next: Arc<AtomicBool>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_count(&self) -> u64 {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Makes the next upload fail as if the image host were down.
    pub fn fail_next_upload(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload(&self, _data: &str) -> Result<String, UploadError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(UploadError::Failed("image host unavailable".to_string()));
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("https://images.test/payment-proofs/{}.jpg", n))
    }
}
