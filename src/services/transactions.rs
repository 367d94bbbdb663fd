//! Transaction lifecycle engine.
//!
//! Owns registration (hold seats and points, insert the row), the
//! payment proof flow, terminal transitions, and the deadline sweeps.
//! All seat and points movement funnels through here so every hold
//! gets exactly one matching release.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{NewTransaction, Transaction, TransactionStatus, CANCELLABLE_STATUSES};
use crate::error::AppError;
use crate::ports::{
    ImageStore, StoreError, Stores, TransactionFilter, TransactionPage, UploadError,
};

/// Request to open a registration.
#[derive(Debug, Clone)]
pub struct CreateTransactionInput {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub points_requested: i64,
    pub promotion_code: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

/// Per-status counts for the stats endpoint.
#[derive(Debug, Serialize)]
pub struct TransactionStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
}

pub struct TransactionService {
    stores: Stores,
    images: Arc<dyn ImageStore>,
    payment_window: Duration,
    confirmation_window: Duration,
}

impl TransactionService {
    pub fn new(
        stores: Stores,
        images: Arc<dyn ImageStore>,
        payment_window: Duration,
        confirmation_window: Duration,
    ) -> Self {
        Self {
            stores,
            images,
            payment_window,
            confirmation_window,
        }
    }

    /// Registers a user for an event: validates the request, holds
    /// seats and points, and inserts a WaitingPayment transaction.
    pub async fn create_transaction(
        &self,
        input: CreateTransactionInput,
    ) -> Result<Transaction, AppError> {
        if input.quantity < 1 {
            return Err(AppError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        if input.points_requested < 0 {
            return Err(AppError::Validation(
                "points_requested cannot be negative".to_string(),
            ));
        }

        let event = self
            .stores
            .events
            .get(input.event_id)
            .await
            .map_err(|e| AppError::lookup_failed(e, "event", input.event_id))?;

        // Advisory pre-check; the conditional decrement below is the
        // authoritative guard.
        if event.available_seats < input.quantity {
            return Err(AppError::InsufficientSeats {
                available: event.available_seats,
                requested: input.quantity,
            });
        }

        if self
            .stores
            .transactions
            .find_active(input.user_id, input.event_id)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyRegistered);
        }

        let user = self
            .stores
            .users
            .get(input.user_id)
            .await
            .map_err(|e| AppError::lookup_failed(e, "user", input.user_id))?;
        let points_used = input.points_requested.min(user.points);

        let total_amount = event.price * i64::from(input.quantity);

        let (promotion_id, discount_amount) = match input.promotion_code.as_deref() {
            Some(code) => {
                let promotion = self
                    .stores
                    .promotions
                    .get_by_code(code)
                    .await?
                    .ok_or_else(|| {
                        AppError::PromotionInvalid("promotion code not found".to_string())
                    })?;
                if let Err(issue) = promotion.check_valid(Utc::now(), total_amount) {
                    return Err(AppError::PromotionInvalid(issue.message()));
                }
                (Some(promotion.id), promotion.discount_for(total_amount))
            }
            None => (None, 0),
        };

        // Authoritative seat hold. Losing it means another registration
        // took the last seats after the pre-check.
        if !self
            .stores
            .events
            .reserve_seats(input.event_id, input.quantity)
            .await?
        {
            let available = match self.stores.events.get(input.event_id).await {
                Ok(fresh) => fresh.available_seats,
                Err(_) => event.available_seats,
            };
            return Err(AppError::InsufficientSeats {
                available,
                requested: input.quantity,
            });
        }

        if points_used > 0 {
            let held = match self
                .stores
                .users
                .reserve_points(input.user_id, points_used)
                .await
            {
                Ok(held) => held,
                Err(err) => {
                    self.release_seats_logged(input.event_id, input.quantity)
                        .await;
                    return Err(err.into());
                }
            };
            if !held {
                self.release_seats_logged(input.event_id, input.quantity)
                    .await;
                return Err(AppError::PointsConflict(format!(
                    "could not hold {} points for user {}",
                    points_used, input.user_id
                )));
            }
        }

        let transaction = Transaction::new(
            NewTransaction {
                user_id: input.user_id,
                event_id: input.event_id,
                promotion_id,
                quantity: input.quantity,
                total_amount,
                points_used,
                discount_amount,
                payment_method: input.payment_method,
                notes: input.notes,
            },
            self.payment_window,
        );

        match self.stores.transactions.insert(&transaction).await {
            Ok(saved) => {
                tracing::info!(
                    "Created transaction {} for user {} on event {} (final amount {})",
                    saved.id,
                    saved.user_id,
                    saved.event_id,
                    saved.final_amount
                );
                Ok(saved)
            }
            Err(err) => {
                // Undo both holds before surfacing the failure.
                if points_used > 0 {
                    self.release_points_logged(input.user_id, points_used).await;
                }
                self.release_seats_logged(input.event_id, input.quantity)
                    .await;
                match err {
                    StoreError::Conflict(_) => Err(AppError::AlreadyRegistered),
                    other => Err(AppError::Store(other)),
                }
            }
        }
    }

    /// Accepts a payment proof for a WaitingPayment transaction and
    /// moves it to WaitingConfirmation. A proof arriving past the
    /// payment deadline expires the transaction instead.
    pub async fn upload_payment_proof(
        &self,
        id: Uuid,
        user_id: Uuid,
        proof: &str,
    ) -> Result<Transaction, AppError> {
        let tx = self
            .stores
            .transactions
            .get(id)
            .await
            .map_err(|e| AppError::lookup_failed(e, "transaction", id))?;

        // Hide other users' transactions rather than confirm they exist.
        if tx.user_id != user_id {
            return Err(AppError::NotFound(format!("transaction {} not found", id)));
        }
        if tx.status != TransactionStatus::WaitingPayment {
            return Err(AppError::InvalidTransition(format!(
                "cannot upload payment proof for transaction {} in status {}",
                id, tx.status
            )));
        }

        let now = Utc::now();
        if now > tx.payment_deadline {
            // The window is gone; expire in place instead of waiting
            // for the sweep.
            self.finalize_with_release(
                id,
                &[TransactionStatus::WaitingPayment],
                TransactionStatus::Expired,
            )
            .await?;
            return Err(AppError::DeadlinePassed(format!(
                "payment deadline for transaction {} passed at {}",
                id, tx.payment_deadline
            )));
        }

        // Upload before touching state; a failed upload leaves the
        // transaction in WaitingPayment.
        let proof_url = match self.images.upload(proof).await {
            Ok(url) => url,
            Err(UploadError::Rejected(msg)) => return Err(AppError::Validation(msg)),
            Err(UploadError::Failed(msg)) => return Err(AppError::UploadFailed(msg)),
        };

        let confirmation_deadline = now + self.confirmation_window;
        match self
            .stores
            .transactions
            .attach_payment_proof(id, &proof_url, confirmation_deadline)
            .await?
        {
            Some(updated) => {
                tracing::info!(
                    "Payment proof attached to transaction {}; confirmation due {}",
                    updated.id,
                    confirmation_deadline
                );
                Ok(updated)
            }
            None => Err(self.transition_refused(id, "upload payment proof for").await),
        }
    }

    /// Cancels a pending transaction and returns its holds.
    /// `acting_user`, when given, must own the transaction.
    pub async fn cancel_transaction(
        &self,
        id: Uuid,
        acting_user: Option<Uuid>,
    ) -> Result<Transaction, AppError> {
        let tx = self
            .stores
            .transactions
            .get(id)
            .await
            .map_err(|e| AppError::lookup_failed(e, "transaction", id))?;

        if let Some(user_id) = acting_user {
            if tx.user_id != user_id {
                return Err(AppError::NotFound(format!("transaction {} not found", id)));
            }
        }

        match self
            .finalize_with_release(id, &CANCELLABLE_STATUSES, TransactionStatus::Cancelled)
            .await?
        {
            Some(cancelled) => Ok(cancelled),
            None => Err(self.transition_refused(id, "cancel").await),
        }
    }

    /// Marks a WaitingConfirmation transaction Done. Seats and points
    /// stay consumed; the sale is final.
    pub async fn accept_payment(&self, id: Uuid) -> Result<Transaction, AppError> {
        match self
            .stores
            .transactions
            .claim_transition(
                id,
                &[TransactionStatus::WaitingConfirmation],
                TransactionStatus::Done,
            )
            .await?
        {
            Some(done) => {
                tracing::info!("Transaction {} accepted", done.id);
                Ok(done)
            }
            None => Err(self.transition_refused(id, "accept").await),
        }
    }

    /// Rejects a WaitingConfirmation transaction and returns its holds.
    pub async fn reject_payment(&self, id: Uuid) -> Result<Transaction, AppError> {
        match self
            .finalize_with_release(
                id,
                &[TransactionStatus::WaitingConfirmation],
                TransactionStatus::Rejected,
            )
            .await?
        {
            Some(rejected) => Ok(rejected),
            None => Err(self.transition_refused(id, "reject").await),
        }
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<Transaction, AppError> {
        self.stores
            .transactions
            .get(id)
            .await
            .map_err(|e| AppError::lookup_failed(e, "transaction", id))
    }

    pub async fn list_user_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<TransactionPage, AppError> {
        Ok(self.stores.transactions.list_by_user(user_id, filter).await?)
    }

    /// True when the user holds an active registration for the event.
    pub async fn is_user_registered(
        &self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> Result<bool, AppError> {
        Ok(self
            .stores
            .transactions
            .find_active(user_id, event_id)
            .await?
            .is_some())
    }

    pub async fn stats(&self) -> Result<TransactionStats, AppError> {
        let counts = self.stores.transactions.count_by_status().await?;
        let total = counts.iter().map(|(_, n)| n).sum();
        let by_status = counts
            .into_iter()
            .map(|(status, n)| (status.as_str().to_string(), n))
            .collect();
        Ok(TransactionStats { total, by_status })
    }

    /// Expires WaitingPayment transactions whose payment deadline
    /// precedes `now`. Returns the number of rows expired.
    pub async fn sweep_expired_payments(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let due = self.stores.transactions.find_expired_payments(now).await?;

        let mut expired = 0;
        for tx in due {
            match self
                .finalize_with_release(
                    tx.id,
                    &[TransactionStatus::WaitingPayment],
                    TransactionStatus::Expired,
                )
                .await
            {
                Ok(Some(_)) => expired += 1,
                Ok(None) => {
                    tracing::debug!("Transaction {} already left WaitingPayment", tx.id)
                }
                Err(e) => tracing::error!("Failed to expire transaction {}: {}", tx.id, e),
            }
        }
        Ok(expired)
    }

    /// Rejects WaitingConfirmation transactions whose confirmation
    /// deadline precedes `now`. Returns the number of rows rejected.
    pub async fn sweep_expired_confirmations(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let due = self
            .stores
            .transactions
            .find_expired_confirmations(now)
            .await?;

        let mut rejected = 0;
        for tx in due {
            match self
                .finalize_with_release(
                    tx.id,
                    &[TransactionStatus::WaitingConfirmation],
                    TransactionStatus::Rejected,
                )
                .await
            {
                Ok(Some(_)) => rejected += 1,
                Ok(None) => {
                    tracing::debug!("Transaction {} already left WaitingConfirmation", tx.id)
                }
                Err(e) => tracing::error!("Failed to reject transaction {}: {}", tx.id, e),
            }
        }
        Ok(rejected)
    }

    /// Claims a terminal transition and returns the row's holds to
    /// their pools. `Ok(None)` means another caller already moved the
    /// row out of `from`, in which case nothing is released.
    async fn finalize_with_release(
        &self,
        id: Uuid,
        from: &[TransactionStatus],
        to: TransactionStatus,
    ) -> Result<Option<Transaction>, AppError> {
        let Some(tx) = self
            .stores
            .transactions
            .claim_transition(id, from, to)
            .await?
        else {
            return Ok(None);
        };

        self.release_seats_logged(tx.event_id, tx.quantity).await;
        if tx.points_used > 0 {
            self.release_points_logged(tx.user_id, tx.points_used).await;
        }
        tracing::info!(
            "Transaction {} moved to {} (released {} seats, {} points)",
            tx.id,
            to,
            tx.quantity,
            tx.points_used
        );
        Ok(Some(tx))
    }

    /// Builds the error for a transition whose claim found the row in
    /// the wrong state or missing.
    async fn transition_refused(&self, id: Uuid, action: &str) -> AppError {
        match self.stores.transactions.get(id).await {
            Ok(tx) => AppError::InvalidTransition(format!(
                "cannot {} transaction {} in status {}",
                action, id, tx.status
            )),
            Err(StoreError::NotFound(_)) => {
                AppError::NotFound(format!("transaction {} not found", id))
            }
            Err(other) => AppError::Store(other),
        }
    }

    /// Best-effort compensating release; failures are logged, never
    /// propagated over the caller's own outcome.
    async fn release_seats_logged(&self, event_id: Uuid, quantity: i32) {
        if let Err(e) = self.stores.events.release_seats(event_id, quantity).await {
            tracing::error!(
                "Failed to release {} seats for event {}: {}",
                quantity,
                event_id,
                e
            );
        }
    }

    async fn release_points_logged(&self, user_id: Uuid, points: i64) {
        if let Err(e) = self.stores.users.release_points(user_id, points).await {
            tracing::error!(
                "Failed to release {} points for user {}: {}",
                points,
                user_id,
                e
            );
        }
    }
}
