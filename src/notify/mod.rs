use crate::db::models::alert_models::Alert;
use anyhow::Result;
use async_trait::async_trait;

pub mod discord;

pub use discord::DiscordNotifier;

/// Capability for delivering alerts to an external channel.
///
/// Delivery is best-effort: callers log failures and carry on, the
/// persisted alert is the source of truth either way.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Deliver a single alert
    async fn send(&self, alert: &Alert) -> Result<()>;
}
