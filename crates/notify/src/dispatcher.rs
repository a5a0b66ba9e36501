//! Fans a message out to every active channel.
//!
//! Placeholders are substituted once and the resulting text goes to each
//! channel in order (email, SMS, Slack, Discord, Telegram). Channels are
//! attempted one after another and a failing channel never stops the next.

use std::time::Instant;

use herald_core::{ChannelKind, NotificationConfig};

use crate::discord::DiscordNotifier;
use crate::email::EmailNotifier;
use crate::slack::SlackNotifier;
use crate::sms::SmsNotifier;
use crate::telegram::TelegramNotifier;
use crate::templating::{Substitute, TemplateRenderer};
use crate::traits::{DispatchResult, Notifier};

pub struct Dispatcher {
    substitution: Box<dyn Substitute>,
    channels: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    /// Build one notifier per active channel, sharing a single HTTP client.
    pub fn new(config: &NotificationConfig) -> Self {
        let client = reqwest::Client::new();
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();

        if let Some(email) = &config.email {
            channels.push(Box::new(EmailNotifier::from_config(
                email,
                &config.email_addressing,
                &config.endpoints,
                &client,
            )));
        }
        if let Some(sms) = &config.sms {
            channels.push(Box::new(SmsNotifier::from_config(
                sms,
                &config.sms_addressing,
                &config.endpoints,
                &client,
            )));
        }
        if let Some(slack) = &config.slack {
            channels.push(Box::new(SlackNotifier::from_config(slack, &client)));
        }
        if let Some(discord) = &config.discord {
            channels.push(Box::new(DiscordNotifier::from_config(discord, &client)));
        }
        if let Some(telegram) = &config.telegram {
            channels.push(Box::new(TelegramNotifier::from_config(telegram, &client)));
        }

        Self::from_parts(
            Box::new(TemplateRenderer::new(config.variables.clone())),
            channels,
        )
    }

    /// Assemble a dispatcher from prebuilt parts. Channels are sorted into
    /// dispatch order.
    pub fn from_parts(
        substitution: Box<dyn Substitute>,
        mut channels: Vec<Box<dyn Notifier>>,
    ) -> Self {
        channels.sort_by_key(|c| c.channel());
        Self {
            substitution,
            channels,
        }
    }

    pub fn channels(&self) -> Vec<ChannelKind> {
        self.channels.iter().map(|c| c.channel()).collect()
    }

    /// Send `message` to every active channel.
    ///
    /// Returns one result per attempted channel. Never fails: delivery errors
    /// are logged and reported in the results.
    pub async fn dispatch(&self, message: &str) -> Vec<DispatchResult> {
        if self.channels.is_empty() {
            tracing::warn!("No notification channels configured, nothing sent");
            return Vec::new();
        }

        tracing::info!(channels = self.channels.len(), "Sending notification");
        let text = self.substitution.substitute(message);

        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let kind = channel.channel();
            tracing::info!(channel = %kind, "Sending");

            let start = Instant::now();
            let result = channel.send(&text).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (provider, error) = match result {
                Ok(provider) => {
                    tracing::info!(
                        channel = %kind,
                        provider,
                        duration_ms,
                        "Notification delivered"
                    );
                    (Some(provider), None)
                }
                Err(e) => {
                    tracing::warn!(
                        channel = %kind,
                        error = %e,
                        duration_ms,
                        "Notification delivery failed"
                    );
                    (None, Some(e.to_string()))
                }
            };
            tracing::debug!(channel = %kind, "Finished");

            results.push(DispatchResult {
                channel: kind,
                success: error.is_none(),
                provider,
                error,
                duration_ms,
            });
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NotifyError;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct MockNotifier {
        kind: ChannelKind,
        received: Arc<Mutex<Vec<(ChannelKind, String)>>>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, text: &str) -> Result<&'static str, NotifyError> {
            self.received.lock().unwrap().push((self.kind, text.to_string()));
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok("mock")
            }
        }

        fn channel(&self) -> ChannelKind {
            self.kind
        }
    }

    struct CountingSubstitution {
        inner: TemplateRenderer,
        calls: Arc<AtomicUsize>,
    }

    impl Substitute for CountingSubstitution {
        fn substitute(&self, text: &str) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.substitute(text)
        }
    }

    type Received = Arc<Mutex<Vec<(ChannelKind, String)>>>;

    fn mocks(spec: &[(ChannelKind, bool)]) -> (Vec<Box<dyn Notifier>>, Received) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let channels = spec
            .iter()
            .map(|&(kind, should_fail)| {
                Box::new(MockNotifier {
                    kind,
                    received: received.clone(),
                    should_fail,
                }) as Box<dyn Notifier>
            })
            .collect();
        (channels, received)
    }

    #[tokio::test]
    async fn dispatch_to_all_channels() {
        let (channels, received) =
            mocks(&[(ChannelKind::Email, false), (ChannelKind::Slack, false)]);
        let dispatcher = Dispatcher::from_parts(Box::new(TemplateRenderer::default()), channels);

        let results = dispatcher.dispatch("hello").await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert!(results.iter().all(|r| r.provider == Some("mock")));
        assert_eq!(received.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let (channels, received) = mocks(&[
            (ChannelKind::Discord, true),
            (ChannelKind::Telegram, false),
        ]);
        let dispatcher = Dispatcher::from_parts(Box::new(TemplateRenderer::default()), channels);

        let results = dispatcher.dispatch("hello").await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].channel, ChannelKind::Discord);
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("Configuration error: mock failure"));
        assert_eq!(results[1].channel, ChannelKind::Telegram);
        assert!(results[1].success);
        assert_eq!(received.lock().unwrap().len(), 2); // telegram still sent
    }

    #[tokio::test]
    async fn channels_run_in_canonical_order() {
        let (channels, received) = mocks(&[
            (ChannelKind::Telegram, false),
            (ChannelKind::Email, false),
            (ChannelKind::Discord, false),
            (ChannelKind::Sms, false),
            (ChannelKind::Slack, false),
        ]);
        let dispatcher = Dispatcher::from_parts(Box::new(TemplateRenderer::default()), channels);
        assert_eq!(dispatcher.channels(), ChannelKind::ALL.to_vec());

        dispatcher.dispatch("x").await;
        let order: Vec<_> = received.lock().unwrap().iter().map(|(k, _)| *k).collect();
        assert_eq!(order, ChannelKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn substitution_runs_once_and_text_is_shared() {
        let calls = Arc::new(AtomicUsize::new(0));
        let substitution = CountingSubstitution {
            inner: TemplateRenderer::new(BTreeMap::from([(
                "HOST".to_string(),
                "db-01".to_string(),
            )])),
            calls: calls.clone(),
        };
        let (channels, received) = mocks(&[
            (ChannelKind::Email, false),
            (ChannelKind::Sms, true),
            (ChannelKind::Discord, false),
        ]);
        let dispatcher = Dispatcher::from_parts(Box::new(substitution), channels);

        dispatcher.dispatch("Backup on {{HOST}} done").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 3);
        assert!(received.iter().all(|(_, text)| text == "Backup on db-01 done"));
    }

    #[tokio::test]
    async fn no_channels_returns_empty() {
        let dispatcher = Dispatcher::from_parts(Box::new(TemplateRenderer::default()), Vec::new());
        let results = dispatcher.dispatch("hello").await;
        assert!(results.is_empty());
    }

    #[test]
    fn inactive_channels_get_no_notifier() {
        let vars = HashMap::from([
            ("NOTIFICATION_TELEGRAM".to_string(), "1".to_string()),
            ("NOTIFICATION_SLACK".to_string(), "1".to_string()),
        ]);
        let dispatcher = Dispatcher::new(&NotificationConfig::resolve(&vars));
        assert_eq!(dispatcher.channels(), vec![ChannelKind::Slack]);
    }

    #[tokio::test]
    async fn slack_without_providers_is_reported_not_raised() {
        let vars = HashMap::from([("NOTIFICATION_SLACK".to_string(), "1".to_string())]);
        let dispatcher = Dispatcher::new(&NotificationConfig::resolve(&vars));

        let results = dispatcher.dispatch("hello").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].channel, ChannelKind::Slack);
        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("no providers"));
    }
}
