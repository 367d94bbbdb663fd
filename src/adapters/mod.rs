pub mod cloudinary;
pub mod memory;
pub mod postgres_event_store;
pub mod postgres_promotion_store;
pub mod postgres_transaction_store;
pub mod postgres_user_store;

use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Config;
use crate::ports::{ImageStore, Stores};

pub use cloudinary::CloudinaryClient;
pub use memory::{MemoryImageStore, MemoryStore};
pub use postgres_event_store::PostgresEventStore;
pub use postgres_promotion_store::PostgresPromotionStore;
pub use postgres_transaction_store::PostgresTransactionStore;
pub use postgres_user_store::PostgresUserStore;

/// Wires all four store contracts to Postgres over a shared pool.
pub fn postgres_stores(pool: PgPool) -> Stores {
    Stores {
        events: Arc::new(PostgresEventStore::new(pool.clone())),
        users: Arc::new(PostgresUserStore::new(pool.clone())),
        promotions: Arc::new(PostgresPromotionStore::new(pool.clone())),
        transactions: Arc::new(PostgresTransactionStore::new(pool)),
    }
}

/// Picks the Cloudinary backend when both upload settings are present,
/// otherwise falls back to the in-process store.
pub fn image_store(config: &Config) -> Arc<dyn ImageStore> {
    match (&config.cloudinary_upload_url, &config.cloudinary_upload_preset) {
        (Some(url), Some(preset)) => Arc::new(CloudinaryClient::new(url.clone(), preset.clone())),
        _ => {
            tracing::warn!("Cloudinary is not configured, keeping payment proofs in process memory");
            Arc::new(MemoryImageStore::new())
        }
    }
}

/// Wires all four store contracts to a single in-memory backend and
/// returns the backend handle for seeding.
pub fn memory_stores() -> (Stores, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let stores = Stores {
        events: store.clone(),
        users: store.clone(),
        promotions: store.clone(),
        transactions: store.clone(),
    };
    (stores, store)
}
