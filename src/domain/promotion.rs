//! Promotion domain entity and validation rules.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Reason a promotion code cannot be used. Checked in order; the first
/// failing rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionIssue {
    Inactive,
    Expired,
    UsageLimitReached,
    BelowMinPurchase { min_purchase: i64 },
}

impl PromotionIssue {
    pub fn message(&self) -> String {
        match self {
            PromotionIssue::Inactive => "promotion code is not active".to_string(),
            PromotionIssue::Expired => "promotion code has expired".to_string(),
            PromotionIssue::UsageLimitReached => {
                "promotion code has reached its usage limit".to_string()
            }
            PromotionIssue::BelowMinPurchase { min_purchase } => {
                format!("minimum purchase amount is {}", min_purchase)
            }
        }
    }
}

/// Percentage discount code. `current_uses` is incremented through the
/// store's conditional update, never read-modify-write.
#[derive(Debug, Clone, Serialize)]
pub struct Promotion {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: i32,
    pub max_uses: Option<i32>,
    pub current_uses: i32,
    pub min_purchase: Option<i64>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Promotion {
    pub fn new(
        code: impl Into<String>,
        discount_percent: i32,
        valid_until: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            discount_percent,
            max_uses: None,
            current_uses: 0,
            min_purchase: None,
            valid_until,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_max_uses(mut self, max_uses: i32) -> Self {
        self.max_uses = Some(max_uses);
        self
    }

    pub fn with_min_purchase(mut self, min_purchase: i64) -> Self {
        self.min_purchase = Some(min_purchase);
        self
    }

    /// Validates the code against a purchase of `total_amount` at `now`.
    pub fn check_valid(
        &self,
        now: DateTime<Utc>,
        total_amount: i64,
    ) -> Result<(), PromotionIssue> {
        if !self.is_active {
            return Err(PromotionIssue::Inactive);
        }
        if now > self.valid_until {
            return Err(PromotionIssue::Expired);
        }
        if let Some(max_uses) = self.max_uses {
            if self.current_uses >= max_uses {
                return Err(PromotionIssue::UsageLimitReached);
            }
        }
        if let Some(min_purchase) = self.min_purchase {
            if total_amount < min_purchase {
                return Err(PromotionIssue::BelowMinPurchase { min_purchase });
            }
        }
        Ok(())
    }

    /// Discount in whole IDR for a purchase of `total_amount`.
    pub fn discount_for(&self, total_amount: i64) -> i64 {
        total_amount * i64::from(self.discount_percent) / 100
    }
}
