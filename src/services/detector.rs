use crate::config::DetectorConfig;
use crate::error::Error;
use anyhow::Result;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Client for the camera monitor's HTTP API
pub struct DetectorClient {
    base_url: String,
    client: reqwest::Client,
}

/// Subset of the monitor configuration consumed here
#[derive(Debug, Deserialize)]
struct DetectorConfigResponse {
    #[serde(default)]
    cameras: HashMap<String, serde_json::Value>,
}

impl DetectorClient {
    /// Create a new detector client
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Service(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: format!("http://{}:{}", config.server, config.port),
            client,
        })
    }

    /// List camera names known to the monitor
    pub async fn cameras(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/config", self.base_url);
        debug!("Fetching monitor configuration from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Service(format!("Failed to fetch monitor config: {}", e)))?;

        if !response.status().is_success() {
            return Err(
                Error::Service(format!("Unexpected status code: {}", response.status())).into(),
            );
        }

        let config: DetectorConfigResponse = response
            .json()
            .await
            .map_err(|e| Error::Service(format!("Failed to parse monitor config: {}", e)))?;

        let mut cameras: Vec<String> = config.cameras.into_keys().collect();
        cameras.sort();

        debug!("Found {} cameras", cameras.len());

        Ok(cameras)
    }

    /// Fetch the latest still image for a camera
    pub async fn latest_snapshot(&self, camera: &str) -> Result<Vec<u8>> {
        let url = format!("{}/api/{}/latest.jpg?h=300", self.base_url, camera);
        debug!("Fetching snapshot for camera {} from {}", camera, url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Service(format!("Failed to fetch snapshot: {}", e)))?;

        if !response.status().is_success() {
            return Err(
                Error::Service(format!("Unexpected status code: {}", response.status())).into(),
            );
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Service(format!("Failed to read snapshot body: {}", e)))?;

        Ok(bytes.to_vec())
    }
}
