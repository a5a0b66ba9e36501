//! Notifier and provider traits, shared error and result types.

use herald_core::ChannelKind;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider '{0}' is not supported by the built-in transport")]
    Unsupported(&'static str),

    #[error("{provider} rejected the request ({status}): {body}")]
    Rejected {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("All providers failed: {}", .0.join("; "))]
    AllProvidersFailed(Vec<String>),
}

/// One notification channel (email, Discord, ...).
///
/// Implementations receive the final message text, after placeholder
/// substitution, and report which provider accepted it.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text` through this channel.
    async fn send(&self, text: &str) -> Result<&'static str, NotifyError>;

    /// Which channel this notifier serves.
    fn channel(&self) -> ChannelKind;
}

/// A single backend of a multi-provider channel, e.g. Twilio for SMS.
///
/// `R` is the channel's request type ([`crate::email::EmailRequest`], ...).
#[async_trait::async_trait]
pub trait Provider<R>: Send + Sync {
    /// Provider id as used in configuration (`"sendgrid"`, `"46elks"`, ...).
    fn id(&self) -> &'static str;

    async fn send(&self, request: &R) -> Result<(), NotifyError>;
}

/// Result of dispatching a notification to a single channel.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchResult {
    pub channel: ChannelKind,
    pub success: bool,
    /// Provider that accepted the message, when delivery succeeded.
    pub provider: Option<&'static str>,
    pub error: Option<String>,
    pub duration_ms: u64,
}
