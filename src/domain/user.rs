//! User domain entity. Only the fields the reservation engine touches.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Account with a points balance. 1 point = 1 IDR of discount.
/// The balance is only ever mutated through the store's
/// reserve/release operations and never goes negative.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(full_name: impl Into<String>, email: impl Into<String>, points: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            full_name: full_name.into(),
            email: email.into(),
            points,
            created_at: now,
            updated_at: now,
        }
    }
}
