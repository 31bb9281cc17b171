//! # Configuration readiness.
//!
//! The configuration collaborator loads settings asynchronously (from
//! storage, over the network). Until it reports ready, no module may start.
//!
//! ```text
//! module thread 1 ──┐
//! module thread 2 ──┼── ReadinessGate::wait ── poll is_ready() every interval ──► proceed
//! module thread N ──┘                          (or cancelled → give up)
//! ```
//!
//! Every thread polls the same flag, so late configuration delays all
//! modules uniformly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::modules::ConfigSection;

/// Boundary to the configuration collaborator.
pub trait ConfigSource: Send + Sync + 'static {
    /// True once configuration has loaded.
    fn is_ready(&self) -> bool;

    /// Section for `key`, if one exists.
    fn section(&self, key: &str) -> Option<ConfigSection>;
}

/// In-memory configuration source.
#[derive(Debug, Default)]
pub struct StaticConfig {
    ready: AtomicBool,
    sections: RwLock<HashMap<String, ConfigSection>>,
}

impl StaticConfig {
    /// Creates a source that is not ready yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source that is already ready.
    pub fn ready() -> Self {
        let cfg = Self::default();
        cfg.set_ready(true);
        cfg
    }

    /// Flips the readiness flag.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
        log::debug!("[config] ready={ready}");
    }

    /// Adds or replaces a section, keyed by its name.
    pub fn insert_section(&self, section: ConfigSection) {
        let mut sections = self.sections.write().unwrap_or_else(PoisonError::into_inner);
        sections.insert(section.name().to_string(), section);
    }
}

impl ConfigSource for StaticConfig {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn section(&self, key: &str) -> Option<ConfigSection> {
        let sections = self.sections.read().unwrap_or_else(PoisonError::into_inner);
        sections.get(key).cloned()
    }
}

/// Polling barrier over [`ConfigSource::is_ready`].
#[derive(Clone)]
pub struct ReadinessGate {
    source: Arc<dyn ConfigSource>,
    interval: Duration,
}

impl ReadinessGate {
    /// Creates a gate polling `source` every `interval` (at least 1 ms).
    pub fn new(source: Arc<dyn ConfigSource>, interval: Duration) -> Self {
        Self {
            source,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Returns `true` once ready, `false` if `token` is cancelled first.
    pub async fn wait(&self, token: &CancellationToken) -> bool {
        loop {
            if self.source.is_ready() {
                return true;
            }
            tokio::select! {
                _ = token.cancelled() => return false,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("interval", &self.interval)
            .field("ready", &self.source.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn gate_opens_on_the_first_poll_after_ready() {
        let cfg = Arc::new(StaticConfig::new());
        let gate = ReadinessGate::new(cfg.clone(), Duration::from_secs(1));
        let token = CancellationToken::new();

        let flip = Arc::clone(&cfg);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            flip.set_ready(true);
        });

        let started = Instant::now();
        assert!(gate.wait(&token).await);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_source_passes_immediately() {
        let gate = ReadinessGate::new(Arc::new(StaticConfig::ready()), Duration::from_secs(1));
        let started = Instant::now();
        assert!(gate.wait(&CancellationToken::new()).await);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_gate_gives_up() {
        let gate = ReadinessGate::new(Arc::new(StaticConfig::new()), Duration::from_secs(1));
        let token = CancellationToken::new();
        token.cancel();
        assert!(!gate.wait(&token).await);
    }

    #[test]
    fn sections_are_keyed_by_name() {
        let cfg = StaticConfig::new();
        cfg.insert_section(ConfigSection::new("clock").with("format", "24h"));
        assert_eq!(cfg.section("clock").unwrap().get_str("format", ""), "24h");
        assert!(cfg.section("weather").is_none());
    }
}
