use serde::{Deserialize, Serialize};

/// Event kind published when a detection first appears
pub const KIND_NEW: &str = "new";

/// Detection event as published by the camera monitor.
///
/// Only `kind`, `before.id` and `before.camera` feed the alert pipeline;
/// the remaining fields ride along and are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Lifecycle classification: "new", "update" or "end"
    #[serde(rename = "type")]
    pub kind: String,
    /// Detection state at the time the event was published
    pub before: DetectionState,
}

/// Per-detection state carried inside an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionState {
    /// The monitor's own identifier for the tracked object
    pub id: String,
    /// Camera the detection came from
    pub camera: String,
    /// Frame timestamp, seconds since the epoch
    #[serde(default)]
    pub frame_time: f64,
    /// Snapshot metadata for the detection frame
    #[serde(default)]
    pub snapshot: DetectionSnapshot,
}

/// Snapshot metadata attached to a detection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionSnapshot {
    #[serde(default)]
    pub frame_time: f64,
    #[serde(rename = "box", default)]
    pub bounding_box: Vec<i64>,
    #[serde(default)]
    pub area: i64,
    #[serde(default)]
    pub region: Vec<i64>,
    #[serde(default)]
    pub score: f64,
}
