//! Promotion code validation, application and expiry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Promotion, PromotionIssue};
use crate::error::AppError;
use crate::ports::Stores;

/// Quote for a promotion code against a purchase total.
#[derive(Debug, Clone, Serialize)]
pub struct PromotionQuote {
    pub promotion_id: Uuid,
    pub code: String,
    pub discount_percent: i32,
    pub discount_amount: i64,
    pub final_amount: i64,
}

pub struct PromotionService {
    stores: Stores,
}

impl PromotionService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Validates a code against a purchase total and quotes the
    /// discount. Never mutates the promotion.
    pub async fn validate(
        &self,
        code: &str,
        total_amount: i64,
    ) -> Result<PromotionQuote, AppError> {
        let promotion = self
            .stores
            .promotions
            .get_by_code(code)
            .await?
            .ok_or_else(|| AppError::PromotionInvalid("promotion code not found".to_string()))?;

        if let Err(issue) = promotion.check_valid(Utc::now(), total_amount) {
            return Err(AppError::PromotionInvalid(issue.message()));
        }

        let discount_amount = promotion.discount_for(total_amount);
        Ok(PromotionQuote {
            promotion_id: promotion.id,
            code: promotion.code,
            discount_percent: promotion.discount_percent,
            discount_amount,
            final_amount: total_amount - discount_amount,
        })
    }

    /// Consumes one use of a code. The increment is conditional on the
    /// store side, so concurrent applies cannot exceed `max_uses`.
    pub async fn apply(&self, code: &str) -> Result<Promotion, AppError> {
        let promotion = self
            .stores
            .promotions
            .get_by_code(code)
            .await?
            .ok_or_else(|| AppError::PromotionInvalid("promotion code not found".to_string()))?;

        let now = Utc::now();
        if !promotion.is_active {
            return Err(AppError::PromotionInvalid(PromotionIssue::Inactive.message()));
        }
        if now > promotion.valid_until {
            return Err(AppError::PromotionInvalid(PromotionIssue::Expired.message()));
        }
        if promotion
            .max_uses
            .is_some_and(|max| promotion.current_uses >= max)
        {
            return Err(AppError::PromotionInvalid(
                PromotionIssue::UsageLimitReached.message(),
            ));
        }

        if !self.stores.promotions.increment_uses(promotion.id).await? {
            // Lost the race on the last remaining use.
            return Err(AppError::PromotionInvalid(
                PromotionIssue::UsageLimitReached.message(),
            ));
        }

        tracing::info!("Promotion {} applied", promotion.code);

        self.stores
            .promotions
            .get_by_code(code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("promotion {} not found", code)))
    }

    /// Deactivates promotions past `valid_until`. Returns the number of
    /// rows changed.
    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let deactivated = self.stores.promotions.deactivate_expired(now).await?;
        if deactivated > 0 {
            tracing::info!("Deactivated {} expired promotions", deactivated);
        }
        Ok(deactivated)
    }
}
