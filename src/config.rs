use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub cloudinary_upload_url: Option<String>,
    pub cloudinary_upload_preset: Option<String>,
    pub scheduler_enabled: bool,
    pub payment_deadline_hours: i64,
    pub confirmation_deadline_days: i64,
    pub event_sync_schedule: String,
    pub payment_sweep_schedule: String,
    pub confirmation_sweep_schedule: String,
    pub promotion_sweep_schedule: String,
    pub cors_allowed_origins: Option<String>,
    pub log_request_body: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL").ok(),
            cloudinary_upload_url: env::var("CLOUDINARY_UPLOAD_URL").ok(),
            cloudinary_upload_preset: env::var("CLOUDINARY_UPLOAD_PRESET").ok(),
            scheduler_enabled: env::var("CRON_JOBS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            payment_deadline_hours: env::var("PAYMENT_DEADLINE_HOURS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            confirmation_deadline_days: env::var("CONFIRMATION_DEADLINE_DAYS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
            event_sync_schedule: env::var("EVENT_SYNC_SCHEDULE")
                .unwrap_or_else(|_| "0 */5 * * * *".to_string()),
            payment_sweep_schedule: env::var("PAYMENT_SWEEP_SCHEDULE")
                .unwrap_or_else(|_| "0 */10 * * * *".to_string()),
            confirmation_sweep_schedule: env::var("CONFIRMATION_SWEEP_SCHEDULE")
                .unwrap_or_else(|_| "0 0 * * * *".to_string()),
            promotion_sweep_schedule: env::var("PROMOTION_SWEEP_SCHEDULE")
                .unwrap_or_else(|_| "0 0 * * * *".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            log_request_body: env::var("LOG_REQUEST_BODY")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
        })
    }

    /// How long a fresh transaction may wait for its payment proof.
    pub fn payment_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.payment_deadline_hours)
    }

    /// How long an uploaded proof may wait for organizer review.
    pub fn confirmation_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.confirmation_deadline_days)
    }
}
