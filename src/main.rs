use axum::http::HeaderValue;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::prelude::*;

use karcis::adapters;
use karcis::cli::{Cli, Commands, DbCommands};
use karcis::config::Config;
use karcis::services::{
    sweep_jobs, EventService, JobScheduler, PromotionService, TransactionService,
};
use karcis::{create_app, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Cli::parse();

    match args.command {
        Some(Commands::Serve { memory }) => serve(config, memory).await,
        Some(Commands::Db(DbCommands::Migrate)) => karcis::cli::handle_db_migrate(&config).await,
        Some(Commands::Sweep(command)) => karcis::cli::handle_sweep(&config, command).await,
        Some(Commands::Config) => karcis::cli::handle_config_validate(&config),
        None => serve(config, false).await,
    }
}

async fn serve(config: Config, memory: bool) -> anyhow::Result<()> {
    let images = adapters::image_store(&config);

    let (stores, db) = if memory {
        tracing::warn!("Running with in-memory stores, all data is lost on shutdown");
        let (stores, _) = adapters::memory_stores();
        (stores, None)
    } else {
        let pool = karcis::db::create_pool(&config).await?;

        let migrator = sqlx::migrate::Migrator::new(std::path::Path::new("./migrations")).await?;
        migrator.run(&pool).await?;
        tracing::info!("Database migrations completed");

        let report = startup::validate_environment(&config, &pool).await?;
        report.print();
        if !report.is_valid() {
            anyhow::bail!("Environment validation failed");
        }

        (adapters::postgres_stores(pool.clone()), Some(pool))
    };

    let transactions = Arc::new(TransactionService::new(
        stores.clone(),
        images,
        config.payment_window(),
        config.confirmation_window(),
    ));
    let events = Arc::new(EventService::new(stores.clone()));
    let promotions = Arc::new(PromotionService::new(stores));

    let scheduler = if config.scheduler_enabled {
        let mut scheduler = JobScheduler::new();
        for job in sweep_jobs(&config, transactions.clone(), events.clone(), promotions.clone())? {
            scheduler.register(job);
        }
        let scheduler = Arc::new(scheduler);
        let handles = scheduler.start();
        tracing::info!("Scheduler started with {} job(s)", handles.len());
        Some(scheduler)
    } else {
        tracing::info!("Scheduler is disabled");
        None
    };

    let state = AppState {
        transactions,
        events,
        promotions,
        db,
        scheduler: scheduler.clone(),
        log_request_body: config.log_request_body,
    };

    let app = create_app(state).layer(cors_layer(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown();
    }

    Ok(())
}

fn cors_layer(config: &Config) -> CorsLayer {
    match config.cors_allowed_origins.as_deref() {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}
