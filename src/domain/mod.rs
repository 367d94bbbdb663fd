mod event;
mod promotion;
mod transaction;
mod user;

pub use event::{Event, EventStatus};
pub use promotion::{Promotion, PromotionIssue};
pub use transaction::{
    final_amount, NewTransaction, StatusParseError, Transaction, TransactionStatus,
    ACTIVE_STATUSES, CANCELLABLE_STATUSES,
};
pub use user::User;
