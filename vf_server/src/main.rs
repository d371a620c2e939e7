//! Venue floor server.
//!
//! Builds the floor components over the configured store and serves the
//! HTTP API until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use chrono::Duration;
use ctrlc::set_handler;
use pico_args::Arguments;
use tracing::info;
use venue_floor::FloorServices;
use venue_floor::auth::StaffGate;
use venue_floor::db::{Database, MemoryStore, PgStore};
use venue_floor::notify::Notifier;
use vf_server::api::{self, AppState};
use vf_server::config::{ConfigOverrides, ServerConfig, StoreBackend};
use vf_server::notify::WebhookDispatcher;
use vf_server::{logging, metrics};

const HELP: &str = "\
Run the venue floor server

USAGE:
  vf_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --store      BACKEND     postgres or memory          [default: env STORE_BACKEND or postgres]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  STORE_BACKEND            postgres | memory
  DATABASE_URL             PostgreSQL connection string
  RUN_MIGRATIONS           Apply schema migrations on startup (true/false)
  JWT_SECRET               Session signing secret, at least 32 characters
  SESSION_TTL_MINUTES      Lifetime of issued sessions
  NOTIFY_WEBHOOK_URL       Webhook receiving floor notifications
  METRICS_BIND             Prometheus scrape address (e.g., 0.0.0.0:9090)
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = ConfigOverrides {
        bind: pargs.opt_value_from_str::<_, SocketAddr>("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        store: pargs.opt_value_from_str::<_, StoreBackend>("--store")?,
    };

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    logging::init();
    info!(bind = %config.bind, store = ?config.store, "Starting venue floor server");

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!(%addr, "Prometheus exporter listening");
    }

    let notifier = match &config.notify_webhook_url {
        Some(url) => {
            info!(%url, "Delivering notifications by webhook");
            Notifier::new(Arc::new(WebhookDispatcher::new(url.clone())?))
        }
        None => Notifier::logging(),
    };

    let secret = config.security.jwt_secret.clone();
    let (services, database) = match config.store {
        StoreBackend::Postgres => {
            let db = Database::new(&config.database)
                .await
                .context("Failed to connect to database")?;
            info!("Database connected successfully");

            if config.run_migrations {
                db.migrate().await.context("Failed to run migrations")?;
                info!("Migrations applied");
            }

            let store = PgStore::new(Arc::new(db.pool().clone()));
            (FloorServices::new(store, notifier, secret.clone()), Some(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; state is lost on exit");
            (
                FloorServices::new(MemoryStore::new(), notifier, secret.clone()),
                None,
            )
        }
    };

    let gate = StaffGate::new(services.staff.clone(), secret)
        .with_session_ttl(Duration::minutes(config.security.session_ttl_minutes));
    let services = services.with_gate(gate);

    let app = api::create_router(AppState::new(services, database));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
    }
}
