//! Multi-channel notification fan-out.
//!
//! This crate provides:
//! - `Notifier` and `Provider` traits for channels and their backends
//! - Email, SMS, Slack, Discord and Telegram implementations
//! - Multi-provider strategies (fallback, roundrobin, no-fallback)
//! - `{{NAME}}` placeholder substitution via minijinja
//! - Dispatcher that sends one message to every configured channel

pub mod discord;
pub mod dispatcher;
pub mod email;
mod http;
pub mod slack;
pub mod sms;
pub mod strategy;
pub mod telegram;
pub mod templating;
pub mod traits;
pub mod webhook;

use std::sync::OnceLock;

use herald_core::NotificationConfig;

pub use dispatcher::Dispatcher;
pub use traits::{DispatchResult, Notifier, NotifyError, Provider};

static DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();

/// Process-wide dispatcher, resolved from the environment on first use.
///
/// The environment is read exactly once; later changes are not picked up.
pub fn global_dispatcher() -> &'static Dispatcher {
    DISPATCHER.get_or_init(|| {
        let config = NotificationConfig::from_env();
        config.log_summary();
        Dispatcher::new(&config)
    })
}

/// Send `message` to every channel configured in the environment.
///
/// Never fails; inspect the returned results to see which channels
/// delivered.
pub async fn send_notification(message: &str) -> Vec<DispatchResult> {
    global_dispatcher().dispatch(message).await
}
