//! Multi-provider sender applying a channel's [`Strategy`].

use std::sync::atomic::{AtomicUsize, Ordering};

use herald_core::{ChannelKind, Strategy};

use crate::traits::{NotifyError, Provider};

/// Sends a request through one of several providers of the same channel.
///
/// - `fallback`: providers are tried in configured order until one succeeds.
/// - `roundrobin`: the starting provider rotates on every send; the others
///   are then tried in order as fallbacks.
/// - `no-fallback`: only the first provider of the rotation is tried.
pub struct MultiProvider<R> {
    channel: ChannelKind,
    strategy: Strategy,
    providers: Vec<Box<dyn Provider<R>>>,
    /// Next starting index for round-robin.
    cursor: AtomicUsize,
}

impl<R: Sync> MultiProvider<R> {
    pub fn new(
        channel: ChannelKind,
        strategy: Strategy,
        providers: Vec<Box<dyn Provider<R>>>,
    ) -> Self {
        Self {
            channel,
            strategy,
            providers,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Indices of the providers to try for the next send, in order.
    fn attempt_order(&self) -> Vec<usize> {
        let n = self.providers.len();
        if n == 0 {
            return Vec::new();
        }
        let start = match self.strategy {
            Strategy::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % n,
            Strategy::Fallback | Strategy::NoFallback => 0,
        };
        let order = (0..n).map(|i| (start + i) % n);
        match self.strategy {
            Strategy::NoFallback => order.take(1).collect(),
            Strategy::Fallback | Strategy::RoundRobin => order.collect(),
        }
    }

    /// Send `request`, returning the id of the provider that accepted it.
    pub async fn send(&self, request: &R) -> Result<&'static str, NotifyError> {
        let order = self.attempt_order();
        if order.is_empty() {
            return Err(NotifyError::Config(format!(
                "no providers configured for {} channel",
                self.channel
            )));
        }

        let mut failures = Vec::with_capacity(order.len());
        let mut last_error = None;

        for idx in order {
            let provider = &self.providers[idx];
            match provider.send(request).await {
                Ok(()) => {
                    tracing::debug!(
                        channel = %self.channel,
                        provider = provider.id(),
                        "provider accepted message"
                    );
                    return Ok(provider.id());
                }
                Err(e) => {
                    tracing::warn!(
                        channel = %self.channel,
                        provider = provider.id(),
                        strategy = %self.strategy,
                        error = %e,
                        "provider failed"
                    );
                    failures.push(format!("{}: {e}", provider.id()));
                    last_error = Some(e);
                }
            }
        }

        match (failures.len(), last_error) {
            (1, Some(e)) => Err(e),
            _ => Err(NotifyError::AllProvidersFailed(failures)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct MockProvider {
        id: &'static str,
        calls: Arc<Mutex<Vec<&'static str>>>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Provider<String> for MockProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        async fn send(&self, _request: &String) -> Result<(), NotifyError> {
            self.calls.lock().unwrap().push(self.id);
            if self.should_fail {
                Err(NotifyError::Config(format!("{} down", self.id)))
            } else {
                Ok(())
            }
        }
    }

    fn sender(
        strategy: Strategy,
        spec: &[(&'static str, bool)],
    ) -> (MultiProvider<String>, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let providers: Vec<Box<dyn Provider<String>>> = spec
            .iter()
            .map(|&(id, should_fail)| {
                Box::new(MockProvider {
                    id,
                    calls: calls.clone(),
                    should_fail,
                }) as Box<dyn Provider<String>>
            })
            .collect();
        (MultiProvider::new(ChannelKind::Sms, strategy, providers), calls)
    }

    #[tokio::test]
    async fn fallback_tries_next_provider() {
        let (sender, calls) =
            sender(Strategy::Fallback, &[("a", true), ("b", false), ("c", false)]);
        let provider = sender.send(&"hi".to_string()).await.unwrap();
        assert_eq!(provider, "b");
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn fallback_always_starts_at_first() {
        let (sender, calls) = sender(Strategy::Fallback, &[("a", false), ("b", false)]);
        sender.send(&"1".to_string()).await.unwrap();
        sender.send(&"2".to_string()).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["a", "a"]);
    }

    #[tokio::test]
    async fn roundrobin_rotates_start() {
        let (sender, calls) =
            sender(Strategy::RoundRobin, &[("a", false), ("b", false), ("c", false)]);
        for _ in 0..4 {
            sender.send(&"x".to_string()).await.unwrap();
        }
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "c", "a"]);
    }

    #[tokio::test]
    async fn roundrobin_falls_back_on_failure() {
        let (sender, calls) =
            sender(Strategy::RoundRobin, &[("a", false), ("b", true), ("c", false)]);
        sender.send(&"1".to_string()).await.unwrap(); // a
        let second = sender.send(&"2".to_string()).await.unwrap(); // b fails, then c
        assert_eq!(second, "c");
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn no_fallback_stops_after_first_failure() {
        let (sender, calls) = sender(Strategy::NoFallback, &[("a", true), ("b", false)]);
        let err = sender.send(&"x".to_string()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Config(ref m) if m == "a down"), "got: {err:?}");
        assert_eq!(*calls.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn all_failures_are_reported() {
        let (sender, _) = sender(Strategy::Fallback, &[("a", true), ("b", true)]);
        match sender.send(&"x".to_string()).await.unwrap_err() {
            NotifyError::AllProvidersFailed(failures) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("a:"));
                assert!(failures[1].starts_with("b:"));
            }
            other => panic!("expected AllProvidersFailed, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_providers_is_a_config_error() {
        let (sender, _) = sender(Strategy::RoundRobin, &[]);
        let err = sender.send(&"x".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("no providers configured for sms"), "got: {err}");
    }
}
