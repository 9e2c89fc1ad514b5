mod bot;
mod config;
mod db;
mod error;
mod health;
mod search;
mod session;
mod storage;
mod utils;

use crate::bot::{AdmissionGate, BotHandler, TelegramMessenger};
use crate::config::Config;
use crate::health::HealthState;
use crate::search::{HashEmbedder, SimilaritySearch};
use crate::session::MemorySessionStore;
use crate::storage::Storage;
use anyhow::{Context, Result};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    let log_level = config.log_level();
    let log_dir = &config.logging.dir;

    // Create log directory if it doesn't exist
    std::fs::create_dir_all(log_dir)?;

    // Setup file appender (daily rotation)
    let file_appender = tracing_appender::rolling::daily(log_dir, "expensebot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Use local time for log timestamps
    let local_timer = ChronoLocal::rfc_3339();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_timer(local_timer.clone());

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_timer(local_timer)
        .with_writer(non_blocking);

    // Filter layer based on config
    let mut filter_layer = EnvFilter::from_default_env().add_directive(log_level.into());
    for directive in ["sqlx=warn", "sea_orm=warn"] {
        if let Ok(directive) = directive.parse() {
            filter_layer = filter_layer.add_directive(directive);
        }
    }

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("Starting ExpenseBot...");
    info!("Logs are written to: {}", log_dir);

    // Connect to database
    let db = db::establish_connection(&config.database.url).await?;
    info!("Database connection established");

    // Run migrations
    migration::Migrator::up(&db, None).await?;
    info!("✅ Database migrations completed");

    let repo = Arc::new(db::repo::Repo::new(db.clone()));
    repo.ping().await?;
    info!("✅ Database ping successful");

    // Initialize Telegram Bot
    let mut raw_bot = Bot::new(config.telegram.bot_token.clone());
    if let Some(api_url) = &config.telegram.api_url {
        raw_bot = raw_bot.set_api_url(api_url.parse().context("Invalid telegram.api_url")?);
        info!("Using Telegram API at {}", api_url);
    }
    let bot = raw_bot.throttle(Limits::default());

    let me = bot.get_me().await?;
    let bot_name = me.user.username.clone().unwrap_or_default();
    info!("✅ Logged in as @{}", bot_name);

    let sessions = Arc::new(MemorySessionStore::new());
    let search = Arc::new(SimilaritySearch::new(
        repo.clone(),
        Box::new(HashEmbedder::default()),
    ));
    let gate = AdmissionGate::new(
        config.rate_limit.burst,
        Duration::from_millis(config.rate_limit.refill_ms),
    );

    let handler = BotHandler::new(
        repo.clone(),
        search,
        sessions.clone(),
        Arc::new(TelegramMessenger::new(bot.clone())),
        gate,
        bot_name,
        config.search,
    );

    // Evict idle conversations in the background
    let sweeper_handle = session::spawn_sweeper(
        sessions,
        config.session.sweep_interval(),
        config.session.idle_timeout(),
    );
    info!("✅ Session sweeper started");

    // Liveness and metrics over HTTP
    let health_handle = if config.health.enabled {
        let metrics_handler = handler.clone();
        let state = Arc::new(HealthState::new(
            repo.clone(),
            Arc::new(move || metrics_handler.metrics()),
        ));
        Some(health::spawn_health_server(&config.health.addr(), state).await?)
    } else {
        info!("Health server disabled");
        None
    };

    info!("🤖 Starting Telegram Bot...");

    // Setup Ctrl+C handler
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received Ctrl+C, shutting down...");
        let _ = shutdown_tx.send(()).await;
    });

    // Start Bot in a separate task (non-blocking)
    let bot_handler = handler.clone();
    let bot_handle = tokio::spawn(async move {
        if let Err(e) = bot::run(bot, bot_handler).await {
            error!("Bot error: {:?}", e);
        }
    });

    // Wait for shutdown signal
    shutdown_rx.recv().await;
    info!("Shutting down gracefully...");

    bot_handle.abort();
    sweeper_handle.abort();
    if let Some(handle) = health_handle {
        handle.abort();
    }

    match serde_json::to_string(&handler.metrics()) {
        Ok(snapshot) => info!("Final metrics: {}", snapshot),
        Err(e) => error!("Failed to serialize metrics: {}", e),
    }

    info!("✅ Shutdown complete");
    Ok(())
}
