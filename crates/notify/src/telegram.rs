//! Telegram Bot API notifier.
//!
//! Delivers notifications via the Bot API `sendMessage` endpoint with
//! Markdown parse mode and link previews disabled.

use herald_core::{ChannelKind, TelegramConfig};

use crate::traits::{Notifier, NotifyError};

/// Sends notifications via the Telegram Bot API.
#[derive(Debug)]
pub struct TelegramNotifier {
    bot_key: String,
    chat_id: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn from_config(config: &TelegramConfig, client: &reqwest::Client) -> Self {
        Self {
            bot_key: config.bot_key.clone(),
            chat_id: config.chat_id.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client: client.clone(),
        }
    }

    fn url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_key)
    }

    /// `chat_id` is omitted when unset and Telegram reports the error.
    fn payload(&self, text: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
            "text": text,
        });
        if let Some(ref chat_id) = self.chat_id {
            body["chat_id"] = serde_json::Value::String(chat_id.clone());
        }
        body
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    /// Sends a notification via the Telegram `sendMessage` API.
    async fn send(&self, text: &str) -> Result<&'static str, NotifyError> {
        tracing::debug!(
            chat_id = self.chat_id.as_deref().unwrap_or("(none)"),
            "Sending Telegram notification"
        );

        let response = self
            .client
            .post(self.url())
            .json(&self.payload(text))
            .send()
            .await?;

        let status = response.status();
        let resp_body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);

        if status.is_success() && resp_body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            tracing::info!("Telegram notification sent");
            return Ok("bot-api");
        }

        let description = resp_body
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown Telegram API error");

        Err(NotifyError::Rejected {
            provider: "telegram",
            status: status.as_u16(),
            body: description.to_string(),
        })
    }

    fn channel(&self) -> ChannelKind {
        ChannelKind::Telegram
    }
}
