//! Slack channel. Incoming webhooks are the only supported provider.

use herald_core::{ChannelConfig, ChannelKind, SlackProvider};
use serde_json::json;

use crate::strategy::MultiProvider;
use crate::traits::{Notifier, NotifyError, Provider};
use crate::webhook::JsonWebhook;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SlackRequest {
    pub text: String,
}

pub struct SlackNotifier {
    sender: MultiProvider<SlackRequest>,
}

impl SlackNotifier {
    pub fn new(sender: MultiProvider<SlackRequest>) -> Self {
        Self { sender }
    }

    /// A Slack channel may be active with no providers; sends then fail with
    /// a configuration error.
    pub fn from_config(config: &ChannelConfig<SlackProvider>, client: &reqwest::Client) -> Self {
        let providers = config
            .providers
            .iter()
            .map(|spec| build_provider(spec, client))
            .collect();
        Self::new(MultiProvider::new(ChannelKind::Slack, config.strategy, providers))
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, text: &str) -> Result<&'static str, NotifyError> {
        let request = SlackRequest {
            text: text.to_string(),
        };
        self.sender.send(&request).await
    }

    fn channel(&self) -> ChannelKind {
        ChannelKind::Slack
    }
}

pub fn build_provider(
    spec: &SlackProvider,
    client: &reqwest::Client,
) -> Box<dyn Provider<SlackRequest>> {
    match spec {
        SlackProvider::Webhook { webhook_url } => Box::new(SlackWebhook {
            webhook: webhook_url
                .as_ref()
                .map(|url| JsonWebhook::new(url.clone(), client.clone())),
        }),
    }
}

/// Slack incoming webhook; a missing URL fails at send time.
pub struct SlackWebhook {
    webhook: Option<JsonWebhook>,
}

#[async_trait::async_trait]
impl Provider<SlackRequest> for SlackWebhook {
    fn id(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, request: &SlackRequest) -> Result<(), NotifyError> {
        let webhook = self.webhook.as_ref().ok_or_else(|| {
            NotifyError::Config("NOTIFICATION_SLACK_WEBHOOK_URL is not set".to_string())
        })?;
        webhook.post(self.id(), &json!({ "text": request.text })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::Strategy;

    #[tokio::test]
    async fn empty_provider_list_fails_without_panicking() {
        let config = ChannelConfig {
            providers: Vec::new(),
            strategy: Strategy::RoundRobin,
        };
        let notifier = SlackNotifier::from_config(&config, &reqwest::Client::new());
        let err = notifier.send("hello").await.unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn webhook_without_url_is_config_error() {
        let provider = build_provider(
            &SlackProvider::Webhook { webhook_url: None },
            &reqwest::Client::new(),
        );
        let err = provider
            .send(&SlackRequest {
                text: "hello".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("NOTIFICATION_SLACK_WEBHOOK_URL"), "got: {err}");
    }
}
