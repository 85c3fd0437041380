use crate::config::DatabaseConfig;
use crate::error::Error;
use anyhow::Result;
use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

pub mod models;
pub mod repositories;
pub mod time_format;

const CREATE_ALERTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    camera TEXT NOT NULL,
    triggered_at TEXT NOT NULL,
    message TEXT NOT NULL
)
"#;

/// Database service for handling connections and schema setup
pub struct DatabaseService {
    pub pool: Arc<SqlitePool>,
}

impl DatabaseService {
    /// Create a new database service
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Initializing database service at {}", config.path);

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to open database: {}", e)))?;

        init_schema(&pool).await?;

        info!("Database service initialized");

        Ok(Self { pool: Arc::new(pool) })
    }
}

/// Create the alerts table if it does not exist yet
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(CREATE_ALERTS_TABLE)
        .execute(pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to initialize schema: {}", e)))?;

    Ok(())
}
