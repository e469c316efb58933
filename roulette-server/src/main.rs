//! Coffee Roulette Server
//!
//! Runs weekly matching rounds and delivers the resulting notifications.

mod api;
mod config;
mod scheduler;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, LoadedConfig, get_database_url};
use roulette_core::events::round_completed_channel;
use roulette_core::meetings::HttpMeetingScheduler;
use roulette_core::processors::{NotificationDispatcher, NotificationQueue, RoundCoordinator};
use roulette_core::senders::{ChannelSenders, HttpRelaySender};
use roulette_core::store::PgStore;
use roulette_sdk::objects::RelayChannel;
use server::{build_router, run_server};
use shutdown::{shutdown_signal, spawn_config_reload_handler};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Coffee Roulette - weekly random pairing of colleagues
#[derive(Parser, Debug)]
#[command(name = "roulette-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./roulette-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "ROULETTE_LOG_JSON", default_value = "false")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.log_json);

    tracing::info!("Starting roulette-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Shared config with separate locks for each section
    let shared_config = loaded_config.to_shared();

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let store = Arc::new(PgStore::new(db_pool.clone()));
    let http_client = reqwest::Client::builder()
        .timeout(loaded_config.channels.request_timeout)
        .build()
        .map_err(|e| {
            tracing::error!("Failed to build relay HTTP client: {}", e);
            e
        })?;

    // Round engine and its notification producers
    let (completed_tx, completed_rx) = round_completed_channel();
    let queue = NotificationQueue::new(store.clone(), shared_config.notifications.clone());
    let coordinator = Arc::new(build_coordinator(
        &loaded_config,
        store.clone(),
        queue.clone(),
        completed_tx,
        http_client.clone(),
    ));

    // A round left in_progress by a crash would block every later round
    match coordinator
        .recover_stale_rounds(time::OffsetDateTime::now_utc())
        .await
    {
        Ok(failed) if !failed.is_empty() => {
            tracing::warn!(count = failed.len(), "Failed stale in-progress rounds");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Stale round recovery failed"),
    }

    // Notification dispatcher
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let senders = ChannelSenders::new(
        Arc::new(HttpRelaySender::new(
            RelayChannel::Email,
            loaded_config.channels.email.clone(),
            http_client.clone(),
        )),
        Arc::new(HttpRelaySender::new(
            RelayChannel::Teams,
            loaded_config.channels.teams.clone(),
            http_client,
        )),
    );
    let dispatcher = NotificationDispatcher::new(
        store.clone(),
        senders,
        shared_config.dispatcher.clone(),
    );
    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx, completed_rx));

    // Cron trigger
    let mut round_scheduler =
        scheduler::start_scheduler(&loaded_config.schedule, coordinator.clone()).await?;

    // Create application state
    let state = AppState::new(store, coordinator, queue, shared_config);

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify =
        spawn_config_reload_handler(state.clone(), config_loader, loaded_config);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, shutdown_signal()).await;

    // Stop background tasks
    reload_notify.notify_one();
    if let Some(scheduler) = round_scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!(error = %e, "Failed to stop round scheduler");
        }
    }
    let _ = shutdown_tx.send(true);
    if let Err(e) = dispatcher_handle.await {
        tracing::error!(error = %e, "Notification dispatcher task panicked");
    }

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

fn build_coordinator(
    config: &LoadedConfig,
    store: Arc<PgStore>,
    queue: NotificationQueue,
    completed_tx: roulette_core::events::RoundCompletedSender,
    http_client: reqwest::Client,
) -> RoundCoordinator {
    let coordinator = RoundCoordinator::new(store, queue).with_events(completed_tx);
    match &config.channels.meetings {
        Some(endpoint) => coordinator.with_meeting_scheduler(Arc::new(HttpMeetingScheduler::new(
            endpoint.clone(),
            http_client,
        ))),
        None => {
            tracing::info!("No [meetings] relay configured, meetings will not be booked");
            coordinator
        }
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
