//! JSON-over-HTTP webhook delivery, shared by Slack and Discord.
//!
//! Webhook URLs embed their credentials, so they are never logged.

use crate::http::send_checked;
use crate::traits::NotifyError;

/// POSTs JSON payloads to a single webhook URL.
#[derive(Debug, Clone)]
pub struct JsonWebhook {
    url: String,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl JsonWebhook {
    pub fn new(url: String, client: reqwest::Client) -> Self {
        Self { url, client }
    }

    /// Deliver `payload`, attributing failures to `provider`.
    pub async fn post(
        &self,
        provider: &'static str,
        payload: &serde_json::Value,
    ) -> Result<(), NotifyError> {
        let response = send_checked(provider, self.client.post(&self.url).json(payload)).await?;

        tracing::debug!(
            provider,
            status = %response.status(),
            "webhook notification delivered"
        );

        Ok(())
    }
}
