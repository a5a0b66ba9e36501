//! Discord channel: a single webhook POST of `{ "content": <message> }`.

use herald_core::{ChannelKind, DiscordConfig};
use serde_json::json;

use crate::traits::{Notifier, NotifyError};
use crate::webhook::JsonWebhook;

pub struct DiscordNotifier {
    webhook: JsonWebhook,
}

impl DiscordNotifier {
    pub fn from_config(config: &DiscordConfig, client: &reqwest::Client) -> Self {
        Self {
            webhook: JsonWebhook::new(config.webhook_url.clone(), client.clone()),
        }
    }
}

/// Body of a Discord webhook execution.
pub fn payload(text: &str) -> serde_json::Value {
    json!({ "content": text })
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, text: &str) -> Result<&'static str, NotifyError> {
        self.webhook.post("webhook", &payload(text)).await?;
        Ok("webhook")
    }

    fn channel(&self) -> ChannelKind {
        ChannelKind::Discord
    }
}
