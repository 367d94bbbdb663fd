//! Postgres implementation of UserStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::User;
use crate::ports::{StoreError, StoreResult, UserStore};

#[derive(Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn get(&self, id: Uuid) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        match row {
            Some(row) => Ok(row.into_domain()),
            None => Err(StoreError::NotFound(format!("user {}", id))),
        }
    }

    async fn reserve_points(&self, id: Uuid, amount: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET points = points - $2, updated_at = NOW()
            WHERE id = $1 AND points >= $2
            "#,
        )
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_points(&self, id: Uuid, amount: i64) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET points = points + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    full_name: String,
    email: String,
    points: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_domain(self) -> User {
        User {
            id: self.id,
            full_name: self.full_name,
            email: self.email,
            points: self.points,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
