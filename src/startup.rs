use crate::config::Config;
use anyhow::{Context, Result};
use cron::Schedule;
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub image_store: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.image_store
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Image Store:           {}", status(self.image_store));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "✅ PASS" } else { "❌ FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "✅ OK"
    } else {
        "❌ FAIL"
    }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        image_store: true,
        errors: Vec::new(),
    };

    // Validate environment variables
    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    // Validate database
    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {}", e));
    }

    // Validate the image host when one is configured
    if let Err(e) = validate_image_store(config).await {
        report.image_store = false;
        report.errors.push(format!("Image store: {}", e));
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.payment_deadline_hours <= 0 {
        anyhow::bail!("PAYMENT_DEADLINE_HOURS must be greater than 0");
    }
    if config.confirmation_deadline_days <= 0 {
        anyhow::bail!("CONFIRMATION_DEADLINE_DAYS must be greater than 0");
    }

    // Validate cron expressions
    Schedule::from_str(&config.event_sync_schedule)
        .context("EVENT_SYNC_SCHEDULE is not a valid cron expression")?;
    Schedule::from_str(&config.payment_sweep_schedule)
        .context("PAYMENT_SWEEP_SCHEDULE is not a valid cron expression")?;
    Schedule::from_str(&config.confirmation_sweep_schedule)
        .context("CONFIRMATION_SWEEP_SCHEDULE is not a valid cron expression")?;
    Schedule::from_str(&config.promotion_sweep_schedule)
        .context("PROMOTION_SWEEP_SCHEDULE is not a valid cron expression")?;

    // The upload URL and preset only work as a pair
    match (
        &config.cloudinary_upload_url,
        &config.cloudinary_upload_preset,
    ) {
        (Some(upload_url), Some(_)) => {
            url::Url::parse(upload_url).context("CLOUDINARY_UPLOAD_URL is not a valid URL")?;
        }
        (Some(_), None) => anyhow::bail!("CLOUDINARY_UPLOAD_PRESET is missing"),
        (None, Some(_)) => anyhow::bail!("CLOUDINARY_UPLOAD_URL is missing"),
        (None, None) => {}
    }

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    // Check if migrations are up to date
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_image_store(config: &Config) -> Result<()> {
    // Without Cloudinary credentials the service falls back to the
    // in-process image store, which needs no connectivity.
    let Some(upload_url) = &config.cloudinary_upload_url else {
        return Ok(());
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    // Any HTTP response proves the host is reachable; the upload
    // endpoint rejects plain GETs with a client error.
    client
        .get(upload_url)
        .send()
        .await
        .context("Failed to reach image store")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server_port: 3000,
            database_url: Some("postgres://localhost:5432/karcis".to_string()),
            cloudinary_upload_url: None,
            cloudinary_upload_preset: None,
            scheduler_enabled: true,
            payment_deadline_hours: 2,
            confirmation_deadline_days: 3,
            event_sync_schedule: "0 */5 * * * *".to_string(),
            payment_sweep_schedule: "0 */10 * * * *".to_string(),
            confirmation_sweep_schedule: "0 0 * * * *".to_string(),
            promotion_sweep_schedule: "0 0 * * * *".to_string(),
            cors_allowed_origins: None,
            log_request_body: false,
        }
    }

    #[test]
    fn test_validate_env_vars_accepts_defaults() {
        assert!(validate_env_vars(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_env_vars_rejects_port_zero() {
        let mut config = base_config();
        config.server_port = 0;
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_rejects_bad_cron() {
        let mut config = base_config();
        config.payment_sweep_schedule = "every ten minutes".to_string();
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_rejects_zero_deadline() {
        let mut config = base_config();
        config.payment_deadline_hours = 0;
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_requires_preset_with_url() {
        let mut config = base_config();
        config.cloudinary_upload_url =
            Some("https://api.cloudinary.com/v1_1/demo/image/upload".to_string());
        assert!(validate_env_vars(&config).is_err());
    }
}
