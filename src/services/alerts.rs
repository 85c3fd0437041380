use crate::db::models::alert_models::Alert;
use crate::db::repositories::alerts::AlertRepository;
use crate::error::Error;
use crate::messaging::event::{DetectionEvent, KIND_NEW};
use crate::notify::AlertNotifier;
use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use std::sync::Arc;

/// Kind recorded for operator-triggered alerts
pub const KIND_MANUAL: &str = "manual";

/// Whether an inbound event should become a persisted alert.
///
/// Only freshly started detections qualify; updates, ends and unknown
/// kinds are dropped. Not configurable.
pub fn is_alert_worthy(event: &DetectionEvent) -> bool {
    event.kind == KIND_NEW
}

/// Build an alert id from the upstream detection id, the camera name and
/// the processing instant. The timestamp component keeps redelivered
/// copies of the same detection from colliding on the primary key, so a
/// redelivery produces a second alert instead of an insert conflict.
pub fn make_alert_id(subject_id: &str, camera: &str, now: &DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}",
        subject_id,
        camera,
        now.timestamp_nanos_opt().unwrap_or_default()
    )
}

/// Orchestrates the filter, persist and notify steps for inbound
/// detection events
pub struct AlertService {
    repository: Arc<dyn AlertRepository>,
    notifier: Arc<dyn AlertNotifier>,
}

impl AlertService {
    /// Create a new alert service
    pub fn new(repository: Arc<dyn AlertRepository>, notifier: Arc<dyn AlertNotifier>) -> Self {
        Self { repository, notifier }
    }

    /// Process one inbound detection event.
    ///
    /// Persistence failures abort the event and propagate to the caller;
    /// notification failures are logged and swallowed, the stored alert
    /// stands either way.
    pub async fn process_event(&self, event: &DetectionEvent) -> Result<()> {
        if !is_alert_worthy(event) {
            debug!("Ignoring non-new event: {}", event.kind);
            return Ok(());
        }

        let now = Utc::now();
        let alert = Alert {
            id: make_alert_id(&event.before.id, &event.before.camera, &now),
            kind: event.kind.clone(),
            camera: event.before.camera.clone(),
            triggered_at: now,
            message: format!("An object detected in the {} camera", event.before.camera),
        };

        if let Err(e) = self.repository.save(&alert).await {
            error!(
                "Failed to save alert {} for camera {}: {}",
                alert.id, alert.camera, e
            );
            return Err(e);
        }

        if let Err(e) = self.notifier.send(&alert).await {
            error!("Failed to send notification for alert {}: {}", alert.id, e);
        }

        info!("Processed alert {} for camera {}", alert.id, alert.camera);

        Ok(())
    }

    /// Create, persist and notify an operator-triggered alert, bypassing
    /// the worthiness filter. Persistence failures propagate; notification
    /// failures are soft, as in the event path.
    pub async fn trigger_manual(&self, camera: &str) -> Result<Alert> {
        if camera.is_empty() {
            return Err(Error::Api("Camera name is required".to_string()).into());
        }

        let now = Utc::now();
        let alert = Alert {
            id: format!(
                "manual_{}_{}",
                camera,
                now.timestamp_nanos_opt().unwrap_or_default()
            ),
            kind: KIND_MANUAL.to_string(),
            camera: camera.to_string(),
            triggered_at: now,
            message: format!("Manual snapshot from {} camera", camera),
        };

        if let Err(e) = self.repository.save(&alert).await {
            error!("Failed to save manual alert for camera {}: {}", camera, e);
            return Err(e);
        }

        if let Err(e) = self.notifier.send(&alert).await {
            error!(
                "Failed to send notification for manual alert {}: {}",
                alert.id, e
            );
        }

        info!("Processed manual alert {} for camera {}", alert.id, camera);

        Ok(alert)
    }
}
