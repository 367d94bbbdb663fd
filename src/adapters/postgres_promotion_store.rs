//! Postgres implementation of PromotionStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Promotion;
use crate::ports::{PromotionStore, StoreError, StoreResult};

#[derive(Clone)]
pub struct PostgresPromotionStore {
    pool: PgPool,
}

impl PostgresPromotionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromotionStore for PostgresPromotionStore {
    async fn get_by_code(&self, code: &str) -> StoreResult<Option<Promotion>> {
        let row = sqlx::query_as::<_, PromotionRow>("SELECT * FROM promotions WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        Ok(row.map(PromotionRow::into_domain))
    }

    async fn increment_uses(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE promotions
            SET current_uses = current_uses + 1, updated_at = NOW()
            WHERE id = $1
              AND is_active
              AND (max_uses IS NULL OR current_uses < max_uses)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE promotions
            SET is_active = FALSE, updated_at = NOW()
            WHERE is_active AND valid_until < $1
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
struct PromotionRow {
    id: Uuid,
    code: String,
    discount_percent: i32,
    max_uses: Option<i32>,
    current_uses: i32,
    min_purchase: Option<i64>,
    valid_until: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PromotionRow {
    fn into_domain(self) -> Promotion {
        Promotion {
            id: self.id,
            code: self.code,
            discount_percent: self.discount_percent,
            max_uses: self.max_uses,
            current_uses: self.current_uses,
            min_purchase: self.min_purchase,
            valid_until: self.valid_until,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
