//! Application entry point for the `piquet-ingest` service.
//!
//! This binary orchestrates the startup sequence of the telemetry ingestion
//! pipeline:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool and creating the schema
//! - Opening the MQTT connection shared by the subscription and the
//!   confirmation publisher
//! - Running the ingestion loop and the `/health` endpoint until Ctrl-C
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `MQTT_HOST` (**required**) – MQTT broker host
//! - `INGEST_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `INGEST_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the complete list.
//!
//! This module follows the Explicit Module Boundary Pattern (EMBP): each
//! concern is reached through its gateway (`config`, `schema`, `store`,
//! `transport`, `ingest`, `routes`).
use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::mpsc;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

mod config;
mod ingest;
mod models;
mod routes;
mod schema;
mod store;
mod transport;

pub use config::Config;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    // One broker connection: the event loop feeds ingestion, the client
    // half is the publish capability handed to the confirmation emitter.
    let (client, eventloop) = transport::connect(&cfg);
    let publisher = Arc::new(transport::MqttPublisher::new(client.clone()));
    let store = Arc::new(store::PgReadingStore::new(pool.clone()));
    let confirmations =
        ingest::ConfirmationEmitter::new(publisher, cfg.confirm_topic_prefix.clone());
    let coordinator = Arc::new(ingest::Coordinator::new(store, confirmations));

    let max_in_flight = cfg.ingest_max_in_flight as usize;
    let (tx, rx) = mpsc::channel(max_in_flight.max(1));

    let subscription = tokio::spawn(transport::run_subscription(
        client,
        eventloop,
        cfg.mqtt_topics.clone(),
        tx,
    ));
    let ingestion = tokio::spawn(ingest::run(coordinator, rx, max_in_flight));

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.health_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health endpoint on {addr}"))?;
    tracing::info!("Health endpoint listening on {}", addr);

    let app = routes::router(&cfg);
    let mut http = tokio::spawn(async move { axum::serve(listener, app).await });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutdown requested");
        }
        result = &mut http => {
            tracing::error!("Health endpoint stopped unexpectedly: {:?}", result);
        }
    }

    // Dropping the subscription closes the channel; ingestion then drains
    // the messages already in flight.
    subscription.abort();
    let _ = subscription.await;
    ingestion.await?;

    http.abort();
    pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

// ---

/// Install the global subscriber. `RUST_LOG` wins over `INGEST_LOG_LEVEL`;
/// the latter keeps `sqlx` queries at warn and `rumqttc` at info.
/// `INGEST_SPAN_EVENTS` (`full` | `enter_exit`) widens span events beyond
/// CLOSE, and `FORCE_COLOR` overrides TTY detection.
fn init_tracing() {
    // ---
    let span_events = match env::var("INGEST_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = env::var("INGEST_LOG_LEVEL")
            .ok()
            .filter(|l| ["trace", "debug", "info", "warn", "error"].contains(&l.as_str()))
            .unwrap_or_else(|| "debug".into());
        EnvFilter::new(format!("{level},sqlx::query=warn,rumqttc=info"))
    });

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
