pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;
pub mod utils;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::services::{EventService, JobScheduler, PromotionService, TransactionService};

#[derive(Clone)]
pub struct AppState {
    pub transactions: Arc<TransactionService>,
    pub events: Arc<EventService>,
    pub promotions: Arc<PromotionService>,
    pub db: Option<sqlx::PgPool>,
    pub scheduler: Option<Arc<JobScheduler>>,
    pub log_request_body: bool,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/transactions", post(handlers::transactions::create_transaction))
        .route("/transactions/stats", get(handlers::transactions::transaction_stats))
        .route("/transactions/:id", get(handlers::transactions::get_transaction))
        .route("/transactions/:id/payment-proof", post(handlers::transactions::upload_payment_proof))
        .route("/transactions/:id/cancel", post(handlers::transactions::cancel_transaction))
        .route("/transactions/:id/accept", post(handlers::transactions::accept_payment))
        .route("/transactions/:id/reject", post(handlers::transactions::reject_payment))
        .route("/users/:user_id/transactions", get(handlers::transactions::list_user_transactions))
        .route("/events/:id/seats", get(handlers::events::seat_availability))
        .route("/events/:id/registration-status", get(handlers::transactions::registration_status))
        .route("/promotions/validate", post(handlers::promotions::validate_promotion))
        .route("/promotions/apply", post(handlers::promotions::apply_promotion))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::request_logger_middleware,
        ))
        .with_state(state)
}
