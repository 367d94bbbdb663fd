//! Postgres implementation of TransactionStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStatus, ACTIVE_STATUSES};
use crate::ports::{StoreError, StoreResult, TransactionFilter, TransactionPage, TransactionStore};

/// Upper bound on rows a single sweep pass picks up. Later passes
/// catch anything beyond it.
const SWEEP_BATCH: i64 = 500;

#[derive(Clone)]
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_names(statuses: &[TransactionStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn insert(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (
                id, user_id, event_id, promotion_id, quantity,
                total_amount, points_used, discount_amount, final_amount,
                status, payment_deadline, confirmation_deadline,
                payment_proof, payment_method, notes, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(tx.id)
        .bind(tx.user_id)
        .bind(tx.event_id)
        .bind(tx.promotion_id)
        .bind(tx.quantity)
        .bind(tx.total_amount)
        .bind(tx.points_used)
        .bind(tx.discount_amount)
        .bind(tx.final_amount)
        .bind(tx.status.as_str())
        .bind(tx.payment_deadline)
        .bind(tx.confirmation_deadline)
        .bind(&tx.payment_proof)
        .bind(&tx.payment_method)
        .bind(&tx.notes)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from)?;

        row.into_domain()
    }

    async fn get(&self, id: Uuid) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        match row {
            Some(row) => row.into_domain(),
            None => Err(StoreError::NotFound(format!("transaction {}", id))),
        }
    }

    async fn find_active(
        &self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE user_id = $1 AND event_id = $2 AND status = ANY($3)
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .bind(status_names(&ACTIVE_STATUSES))
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn claim_transition(
        &self,
        id: Uuid,
        from: &[TransactionStatus],
        to: TransactionStatus,
    ) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status_names(from))
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn attach_payment_proof(
        &self,
        id: Uuid,
        proof_url: &str,
        confirmation_deadline: DateTime<Utc>,
    ) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET payment_proof = $2,
                confirmation_deadline = $3,
                status = 'WAITING_CONFIRMATION',
                updated_at = NOW()
            WHERE id = $1 AND status = 'WAITING_PAYMENT'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(proof_url)
        .bind(confirmation_deadline)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> StoreResult<TransactionPage> {
        let status = filter.status.map(|s| s.as_str().to_string());
        let offset = (filter.page - 1) * filter.limit;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            "#,
        )
        .bind(user_id)
        .bind(&status)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from)?;

        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(&status)
        .bind(filter.limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        let items = rows
            .into_iter()
            .map(TransactionRow::into_domain)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(TransactionPage { items, total })
    }

    async fn find_expired_payments(&self, now: DateTime<Utc>) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE status = 'WAITING_PAYMENT' AND payment_deadline < $1
            ORDER BY payment_deadline ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(SWEEP_BATCH)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn find_expired_confirmations(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE status = 'WAITING_CONFIRMATION' AND confirmation_deadline < $1
            ORDER BY confirmation_deadline ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(SWEEP_BATCH)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn count_by_status(&self) -> StoreResult<Vec<(TransactionStatus, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM transactions GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::from)?;

        rows.into_iter()
            .map(|(status, count)| {
                let status = status
                    .parse()
                    .map_err(|e| StoreError::Backend(format!("status column: {}", e)))?;
                Ok((status, count))
            })
            .collect()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    event_id: Uuid,
    promotion_id: Option<Uuid>,
    quantity: i32,
    total_amount: i64,
    points_used: i64,
    discount_amount: i64,
    final_amount: i64,
    status: String,
    payment_deadline: DateTime<Utc>,
    confirmation_deadline: Option<DateTime<Utc>>,
    payment_proof: Option<String>,
    payment_method: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> StoreResult<Transaction> {
        let status = self
            .status
            .parse()
            .map_err(|e| StoreError::Backend(format!("transaction {}: {}", self.id, e)))?;

        Ok(Transaction {
            id: self.id,
            user_id: self.user_id,
            event_id: self.event_id,
            promotion_id: self.promotion_id,
            quantity: self.quantity,
            total_amount: self.total_amount,
            points_used: self.points_used,
            discount_amount: self.discount_amount,
            final_amount: self.final_amount,
            status,
            payment_deadline: self.payment_deadline,
            confirmation_deadline: self.confirmation_deadline,
            payment_proof: self.payment_proof,
            payment_method: self.payment_method,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
