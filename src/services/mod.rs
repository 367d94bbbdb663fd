pub mod events;
pub mod promotions;
pub mod scheduler;
pub mod transactions;

pub use events::{EventService, EventSyncReport, SeatAvailability};
pub use promotions::{PromotionQuote, PromotionService};
pub use scheduler::{sweep_jobs, Job, JobScheduler, JobStatus};
pub use transactions::{CreateTransactionInput, TransactionService, TransactionStats};
