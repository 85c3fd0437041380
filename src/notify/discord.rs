use crate::config::DiscordConfig;
use crate::db::models::alert_models::Alert;
use crate::error::Error;
use crate::notify::AlertNotifier;
use crate::services::detector::DetectorClient;
use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use reqwest::multipart;
use std::sync::Arc;

/// Discord webhook notifier with best-effort snapshot attachment
pub struct DiscordNotifier {
    webhook_url: String,
    detector: Arc<DetectorClient>,
    client: reqwest::Client,
}

impl DiscordNotifier {
    /// Create a new Discord notifier
    pub fn new(config: &DiscordConfig, detector: Arc<DetectorClient>) -> Result<Self> {
        if config.webhook_url.is_empty() {
            return Err(Error::Config("Discord webhook URL is not set".to_string()).into());
        }

        info!("Discord notifier initialized");

        Ok(Self {
            webhook_url: config.webhook_url.clone(),
            detector,
            client: reqwest::Client::new(),
        })
    }

    fn build_embed(alert: &Alert) -> serde_json::Value {
        serde_json::json!({
            "title": format!("Alert from {} camera", alert.camera),
            "description": alert.message,
            "color": 0xff0000,
            "timestamp": alert.triggered_at.to_rfc3339(),
            "fields": [
                { "name": "Camera", "value": alert.camera, "inline": true },
                { "name": "Alert ID", "value": alert.id, "inline": true },
                {
                    "name": "Time",
                    "value": alert.triggered_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    "inline": true
                },
            ],
        })
    }
}

#[async_trait]
impl AlertNotifier for DiscordNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        info!("Sending alert {} to Discord", alert.id);

        // Snapshot fetch is best-effort; a text-only notification still
        // goes out when the image is unavailable
        let image = match self.detector.latest_snapshot(&alert.camera).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Failed to fetch snapshot for camera {}: {}", alert.camera, e);
                None
            }
        };

        let payload = serde_json::json!({ "embeds": [Self::build_embed(alert)] });

        let request = match image {
            Some(bytes) => {
                let filename = format!(
                    "{}_alert_{}.jpg",
                    alert.camera,
                    alert.triggered_at.format("%Y%m%d_%H%M%S")
                );
                let part = multipart::Part::bytes(bytes)
                    .file_name(filename)
                    .mime_str("image/jpeg")
                    .map_err(|e| Error::Notification(format!("Failed to build attachment: {}", e)))?;
                let form = multipart::Form::new()
                    .text("payload_json", payload.to_string())
                    .part("files[0]", part);
                self.client.post(&self.webhook_url).multipart(form)
            }
            None => self.client.post(&self.webhook_url).json(&payload),
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::Notification(format!("Failed to deliver webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Notification(format!(
                "Webhook returned status {}",
                response.status()
            ))
            .into());
        }

        info!("Sent alert {} to Discord", alert.id);

        Ok(())
    }
}
