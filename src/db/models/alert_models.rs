use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted detection or manual-trigger alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert id, immutable once assigned
    pub id: String,
    /// Origin of the alert ("new" for detections, "manual" for triggers)
    pub kind: String,
    /// Camera the alert came from
    pub camera: String,
    /// Processing-time instant, not the upstream frame timestamp
    pub triggered_at: DateTime<Utc>,
    /// Human-readable description
    pub message: String,
}
