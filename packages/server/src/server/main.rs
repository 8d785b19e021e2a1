// Main entry point for the helpdesk API server

use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::{Context, Result};
use helpdesk_core::domains::tickets::change_feed::supervise;
use helpdesk_core::domains::tickets::{
    ChangeFeedBridge, InMemoryTicketStore, PostgresTicketStore, TicketStore,
};
use helpdesk_core::kernel::{
    BaseHostLookup, CommandHostLookup, DisabledHostLookup, ServerDeps, StreamHub,
};
use helpdesk_core::{server::build_app, Config};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,helpdesk_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting helpdesk ticket API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    let store: Arc<dyn TicketStore> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connected");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Migrations complete");

            Arc::new(PostgresTicketStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, tickets are kept in memory and lost on restart");
            Arc::new(InMemoryTicketStore::new())
        }
    };

    let host_lookup: Arc<dyn BaseHostLookup> = match config
        .host_lookup_command
        .as_deref()
        .and_then(|line| CommandHostLookup::from_command_line(line, config.host_lookup_timeout))
    {
        Some(lookup) => Arc::new(lookup),
        None => {
            tracing::info!("HOST_LOOKUP_COMMAND not set, host capture answers with placeholders");
            Arc::new(DisabledHostLookup)
        }
    };

    let stream_hub = StreamHub::new();
    let mut bridge = ChangeFeedBridge::spawn(store.clone(), stream_hub.clone()).await;

    let deps = ServerDeps::new(store, stream_hub, host_lookup);
    let app = build_app(deps, &config.allowed_origins);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Ticket change feed: http://localhost:{}/api/tickets/stream", config.port);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .into_future();

    tokio::select! {
        result = server => result.context("Server error")?,
        exit = supervise(&mut bridge) => {
            anyhow::bail!("Change feed bridge stopped: {:?}", exit);
        }
    }

    Ok(())
}
