pub mod events;
pub mod promotions;
pub mod transactions;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::services::JobStatus;
use crate::AppState;

#[derive(Serialize)]
pub struct DbPoolStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub backend: String,
    pub db: String,
    pub db_pool: Option<DbPoolStats>,
    pub jobs: Vec<JobStatus>,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    // Check database connectivity with SELECT 1 when running against
    // Postgres; the in-memory backend is always reachable.
    let (backend, db_status, pool_stats) = match &state.db {
        Some(pool) => {
            let db_status = match sqlx::query("SELECT 1").execute(pool).await {
                Ok(_) => "connected",
                Err(_) => "disconnected",
            };
            let stats = DbPoolStats {
                active_connections: pool.size(),
                idle_connections: pool.num_idle() as u32,
                max_connections: pool.options().get_max_connections(),
            };
            ("postgres", db_status, Some(stats))
        }
        None => ("memory", "connected", None),
    };

    let jobs = state
        .scheduler
        .as_ref()
        .map(|scheduler| scheduler.status())
        .unwrap_or_default();

    let health_response = HealthStatus {
        status: if db_status == "connected" {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        version: "0.1.0".to_string(),
        backend: backend.to_string(),
        db: db_status.to_string(),
        db_pool: pool_stats,
        jobs,
    };

    // Return 503 if the database is down, 200 otherwise
    let status_code = if db_status == "connected" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}
