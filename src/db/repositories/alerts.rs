use crate::db::models::alert_models::Alert;
use crate::db::time_format;
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Alert storage operations used by the pipeline and the read API
#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Insert a new alert; fails if the id already exists
    async fn save(&self, alert: &Alert) -> Result<()>;

    /// Most-recent-first page of alerts across all cameras
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Alert>>;

    /// Most-recent-first page of alerts for a single camera
    async fn list_by_camera(&self, camera: &str, limit: i64, offset: i64) -> Result<Vec<Alert>>;

    /// Total number of alerts stored for a single camera
    async fn count_by_camera(&self, camera: &str) -> Result<i64>;
}

/// Alerts repository backed by SQLite
#[derive(Clone)]
pub struct SqliteAlertRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteAlertRepository {
    /// Create a new alerts repository
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    fn row_to_alert(row: &SqliteRow) -> Result<Alert> {
        let stored: String = row
            .try_get("triggered_at")
            .map_err(|e| Error::Database(format!("Failed to read triggered_at: {}", e)))?;
        let triggered_at = time_format::parse_timestamp(&stored)
            .map_err(|e| Error::Decode(e.to_string()))?;

        Ok(Alert {
            id: row
                .try_get("id")
                .map_err(|e| Error::Database(format!("Failed to read id: {}", e)))?,
            kind: row
                .try_get("kind")
                .map_err(|e| Error::Database(format!("Failed to read kind: {}", e)))?,
            camera: row
                .try_get("camera")
                .map_err(|e| Error::Database(format!("Failed to read camera: {}", e)))?,
            triggered_at,
            message: row
                .try_get("message")
                .map_err(|e| Error::Database(format!("Failed to read message: {}", e)))?,
        })
    }
}

#[async_trait]
impl AlertRepository for SqliteAlertRepository {
    async fn save(&self, alert: &Alert) -> Result<()> {
        debug!("Saving alert {} for camera {}", alert.id, alert.camera);

        sqlx::query(
            r#"
            INSERT INTO alerts (id, kind, camera, triggered_at, message)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.kind)
        .bind(&alert.camera)
        .bind(time_format::format_timestamp(&alert.triggered_at))
        .bind(&alert.message)
        .execute(&*self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db)
                if db.kind() == sqlx::error::ErrorKind::UniqueViolation =>
            {
                Error::AlreadyExists(format!("Alert already exists: {}", alert.id))
            }
            _ => Error::Database(format!("Failed to save alert: {}", e)),
        })?;

        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, camera, triggered_at, message
            FROM alerts
            ORDER BY triggered_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list alerts: {}", e)))?;

        rows.iter().map(Self::row_to_alert).collect()
    }

    async fn list_by_camera(&self, camera: &str, limit: i64, offset: i64) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, camera, triggered_at, message
            FROM alerts
            WHERE camera = ?
            ORDER BY triggered_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(camera)
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list alerts for camera: {}", e)))?;

        rows.iter().map(Self::row_to_alert).collect()
    }

    async fn count_by_camera(&self, camera: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM alerts WHERE camera = ?")
            .bind(camera)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to count alerts for camera: {}", e)))?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| Error::Database(format!("Failed to read count: {}", e)))?;

        Ok(count)
    }
}
