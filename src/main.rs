use anyhow::Result;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

mod api;
mod config;
mod db;
mod error;
mod messaging;
mod notify;
mod services;

pub use error::Error;

use api::rest::{AppState, RestApi};
use db::repositories::alerts::SqliteAlertRepository;
use db::DatabaseService;
use messaging::subscriber::EVENT_CHANNEL_CAPACITY;
use messaging::DetectionSubscriber;
use notify::DiscordNotifier;
use services::alerts::AlertService;
use services::detector::DetectorClient;

async fn run_app() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;

    // Initialize logging with the configured default level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.api.log_level),
    )
    .init();

    info!("Starting camera alerter service");

    // Make sure the database directory exists
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let database = DatabaseService::new(&config.database).await?;
    let repository = Arc::new(SqliteAlertRepository::new(database.pool.clone()));

    let detector = Arc::new(DetectorClient::new(&config.detector)?);
    let notifier = Arc::new(DiscordNotifier::new(&config.discord, detector.clone())?);
    let alert_service = Arc::new(AlertService::new(repository.clone(), notifier));

    // The consumer hands events to the pipeline through a bounded channel;
    // one event is fully processed before the next begins
    let (event_tx, mut event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let subscriber = DetectionSubscriber::new(config.message_broker.clone())?;
    subscriber.start(event_tx).await?;
    info!("Subscribed to detection events");

    let pipeline_service = alert_service.clone();
    let pipeline = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if let Err(e) = pipeline_service.process_event(&event).await {
                error!("Error processing event: {}", e);
            }
        }
    });

    let state = AppState {
        repository,
        alert_service,
        detector,
    };
    let http_server = RestApi::new(&config.api, state)?;
    let server = tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            error!("API server error: {}", e);
        }
    });

    // Wait for termination signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    subscriber.close().await;
    pipeline.abort();
    server.abort();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}
