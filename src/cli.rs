use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::services::{EventService, PromotionService, TransactionService};

#[derive(Parser)]
#[command(name = "karcis")]
#[command(about = "Karcis - Event Ticketing Transaction Engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Run against in-memory stores instead of Postgres
        #[arg(long)]
        memory: bool,
    },

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Run one lifecycle sweep and exit
    #[command(subcommand)]
    Sweep(SweepCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum SweepCommands {
    /// Expire transactions past their payment deadline
    Payments,

    /// Expire transactions past their confirmation deadline
    Confirmations,

    /// Deactivate promotions past their validity window
    Promotions,

    /// Align event statuses with their start and end dates
    Events,
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    use sqlx::migrate::Migrator;
    use std::path::Path;

    let pool = crate::db::create_pool(config).await?;
    let migrator = Migrator::new(Path::new("./migrations")).await?;

    tracing::info!("Running database migrations...");
    migrator.run(&pool).await?;

    tracing::info!("Database migrations completed");
    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_sweep(config: &Config, command: SweepCommands) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;
    let stores = crate::adapters::postgres_stores(pool);
    let now = chrono::Utc::now();

    match command {
        SweepCommands::Payments => {
            let service = TransactionService::new(
                stores,
                crate::adapters::image_store(config),
                config.payment_window(),
                config.confirmation_window(),
            );
            let expired = service.sweep_expired_payments(now).await?;
            println!("✓ Expired {} transaction(s) past the payment deadline", expired);
        }
        SweepCommands::Confirmations => {
            let service = TransactionService::new(
                stores,
                crate::adapters::image_store(config),
                config.payment_window(),
                config.confirmation_window(),
            );
            let expired = service.sweep_expired_confirmations(now).await?;
            println!("✓ Expired {} transaction(s) past the confirmation deadline", expired);
        }
        SweepCommands::Promotions => {
            let service = PromotionService::new(stores);
            let deactivated = service.deactivate_expired(now).await?;
            println!("✓ Deactivated {} expired promotion(s)", deactivated);
        }
        SweepCommands::Events => {
            let service = EventService::new(stores);
            let report = service.sync_statuses(now).await?;
            println!("✓ Activated {} and ended {} event(s)", report.activated, report.ended);
        }
    }

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    match &config.database_url {
        Some(url) => println!("  Database URL: {}", mask_password(url)),
        None => println!("  Database URL: (not set)"),
    }
    match &config.cloudinary_upload_url {
        Some(url) => println!("  Cloudinary Upload URL: {}", url),
        None => println!("  Cloudinary Upload URL: (not set)"),
    }
    println!("  Scheduler Enabled: {}", config.scheduler_enabled);
    println!("  Payment Deadline: {} hour(s)", config.payment_deadline_hours);
    println!("  Confirmation Deadline: {} day(s)", config.confirmation_deadline_days);

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user_start = slash_pos + 2;
                let user = &url[user_start..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
