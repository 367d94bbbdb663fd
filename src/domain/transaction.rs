//! Transaction domain entity.
//! One row per registration attempt, carrying the monetary breakdown
//! and the lifecycle state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle state of a transaction.
///
/// `WaitingPayment` and `WaitingConfirmation` hold seats and points;
/// `Done` keeps them consumed; the other three are terminal failures
/// whose entry released the holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    WaitingPayment,
    WaitingConfirmation,
    Done,
    Cancelled,
    Rejected,
    Expired,
}

/// Statuses that count as an existing registration for the
/// one-active-registration-per-event rule.
pub const ACTIVE_STATUSES: [TransactionStatus; 3] = [
    TransactionStatus::WaitingPayment,
    TransactionStatus::WaitingConfirmation,
    TransactionStatus::Done,
];

/// Statuses a user-initiated cancel may leave from.
pub const CANCELLABLE_STATUSES: [TransactionStatus; 2] = [
    TransactionStatus::WaitingPayment,
    TransactionStatus::WaitingConfirmation,
];

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::WaitingPayment => "WAITING_PAYMENT",
            TransactionStatus::WaitingConfirmation => "WAITING_CONFIRMATION",
            TransactionStatus::Done => "DONE",
            TransactionStatus::Cancelled => "CANCELLED",
            TransactionStatus::Rejected => "REJECTED",
            TransactionStatus::Expired => "EXPIRED",
        }
    }

    /// True while the transaction blocks a new registration for the
    /// same (user, event) pair.
    pub fn is_active(&self) -> bool {
        ACTIVE_STATUSES.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Done
                | TransactionStatus::Cancelled
                | TransactionStatus::Rejected
                | TransactionStatus::Expired
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("unknown status value: {0}")]
pub struct StatusParseError(String);

impl StatusParseError {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl FromStr for TransactionStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING_PAYMENT" => Ok(TransactionStatus::WaitingPayment),
            "WAITING_CONFIRMATION" => Ok(TransactionStatus::WaitingConfirmation),
            "DONE" => Ok(TransactionStatus::Done),
            "CANCELLED" => Ok(TransactionStatus::Cancelled),
            "REJECTED" => Ok(TransactionStatus::Rejected),
            "EXPIRED" => Ok(TransactionStatus::Expired),
            other => Err(StatusParseError::new(other)),
        }
    }
}

/// Amount the user still owes after points and promotion discount.
/// Clamped at zero; points and discounts never produce a credit.
pub fn final_amount(total_amount: i64, points_used: i64, discount_amount: i64) -> i64 {
    (total_amount - points_used - discount_amount).max(0)
}

/// Domain entity representing one event registration.
/// Money fields are whole IDR.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub promotion_id: Option<Uuid>,
    pub quantity: i32,
    pub total_amount: i64,
    pub points_used: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
    pub status: TransactionStatus,
    pub payment_deadline: DateTime<Utc>,
    pub confirmation_deadline: Option<DateTime<Utc>>,
    pub payment_proof: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewTransaction {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub promotion_id: Option<Uuid>,
    pub quantity: i32,
    pub total_amount: i64,
    pub points_used: i64,
    pub discount_amount: i64,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

impl Transaction {
    /// Builds a fresh `WaitingPayment` transaction with its payment
    /// deadline `payment_window` from now.
    pub fn new(input: NewTransaction, payment_window: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            event_id: input.event_id,
            promotion_id: input.promotion_id,
            quantity: input.quantity,
            total_amount: input.total_amount,
            points_used: input.points_used,
            discount_amount: input.discount_amount,
            final_amount: final_amount(
                input.total_amount,
                input.points_used,
                input.discount_amount,
            ),
            status: TransactionStatus::WaitingPayment,
            payment_deadline: now + payment_window,
            confirmation_deadline: None,
            payment_proof: None,
            payment_method: input.payment_method,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_upload_payment(&self, now: DateTime<Utc>) -> bool {
        self.status == TransactionStatus::WaitingPayment && now <= self.payment_deadline
    }

    pub fn can_cancel(&self) -> bool {
        CANCELLABLE_STATUSES.contains(&self.status)
    }

    /// Informational flag for list views: the payment window has
    /// elapsed, whether or not the expiry sweep has caught up yet.
    pub fn is_past_payment_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.payment_deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            TransactionStatus::WaitingPayment,
            TransactionStatus::WaitingConfirmation,
            TransactionStatus::Done,
            TransactionStatus::Cancelled,
            TransactionStatus::Rejected,
            TransactionStatus::Expired,
        ] {
            let parsed: TransactionStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert!("PAID".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_done_is_active_but_terminal() {
        assert!(TransactionStatus::Done.is_active());
        assert!(TransactionStatus::Done.is_terminal());
        assert!(!TransactionStatus::Expired.is_active());
    }

    #[test]
    fn test_final_amount_subtracts_points_and_discount() {
        assert_eq!(final_amount(500_000, 10_000, 100_000), 390_000);
    }

    #[test]
    fn test_final_amount_clamps_at_zero() {
        assert_eq!(final_amount(50_000, 40_000, 30_000), 0);
    }

    #[test]
    fn test_new_transaction_sets_deadline_and_status() {
        let tx = Transaction::new(
            NewTransaction {
                user_id: Uuid::new_v4(),
                event_id: Uuid::new_v4(),
                promotion_id: None,
                quantity: 2,
                total_amount: 300_000,
                points_used: 0,
                discount_amount: 0,
                payment_method: Some("bank_transfer".to_string()),
                notes: None,
            },
            Duration::hours(2),
        );

        assert_eq!(tx.status, TransactionStatus::WaitingPayment);
        assert_eq!(tx.final_amount, 300_000);
        let window = tx.payment_deadline - tx.created_at;
        assert_eq!(window, Duration::hours(2));
        assert!(tx.can_upload_payment(Utc::now()));
        assert!(tx.can_cancel());
    }
}
