//! # Per-module runtime handle.
//!
//! [`ModuleContext`] is what a module's `run` hook receives: the shared
//! services (bus, arbiter, hardware bus, configuration) plus a cancellation
//! token that fires on runtime shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::section::ConfigSection;
use crate::core::{ConfigSource, HardwareBus, ReadinessGate};
use crate::events::{Event, EventBus};
use crate::memory::MemoryArbiter;

/// Services and identity handed to [`Module::run`](super::Module::run).
#[derive(Clone)]
pub struct ModuleContext {
    name: String,
    config_key: String,
    bus: Arc<EventBus>,
    arbiter: Arc<MemoryArbiter>,
    hardware: HardwareBus,
    config: Arc<dyn ConfigSource>,
    token: CancellationToken,
    poll_interval: Duration,
}

impl ModuleContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        config_key: String,
        bus: Arc<EventBus>,
        arbiter: Arc<MemoryArbiter>,
        hardware: HardwareBus,
        config: Arc<dyn ConfigSource>,
        token: CancellationToken,
        poll_interval: Duration,
    ) -> Self {
        Self {
            name,
            config_key,
            bus,
            arbiter,
            hardware,
            config,
            token,
            poll_interval,
        }
    }

    /// Module display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration section key.
    pub fn config_key(&self) -> &str {
        &self.config_key
    }

    /// Shared event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Shared memory arbiter.
    pub fn arbiter(&self) -> &Arc<MemoryArbiter> {
        &self.arbiter
    }

    /// Exclusive hardware bus lock.
    pub fn hardware(&self) -> &HardwareBus {
        &self.hardware
    }

    /// Cancellation token of this module.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once the runtime is shutting down.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the runtime is shutting down.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Publishes `event` on the shared bus.
    pub fn publish<T: Event>(&self, event: &T) -> usize {
        self.bus.publish(event)
    }

    /// Waits until configuration is ready. Returns `false` if cancelled first.
    pub async fn wait_for_config(&self) -> bool {
        ReadinessGate::new(Arc::clone(&self.config), self.poll_interval)
            .wait(&self.token)
            .await
    }

    /// This module's configuration section, if configuration is ready and has one.
    pub fn section(&self) -> Option<ConfigSection> {
        if !self.config.is_ready() {
            return None;
        }
        self.config.section(&self.config_key)
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("name", &self.name)
            .field("config_key", &self.config_key)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArbiterConfig;
    use crate::core::StaticConfig;
    use crate::memory::SimulatedHeap;

    fn context(config: Arc<StaticConfig>) -> ModuleContext {
        ModuleContext::new(
            "Weather".into(),
            "weather".into(),
            Arc::new(EventBus::new()),
            Arc::new(MemoryArbiter::new(
                ArbiterConfig::default(),
                Arc::new(SimulatedHeap::new(64_000)),
            )),
            HardwareBus::new(),
            config,
            CancellationToken::new(),
            Duration::from_secs(1),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn section_is_hidden_until_ready() {
        let config = Arc::new(StaticConfig::new());
        config.insert_section(ConfigSection::new("weather").with("city", "Lyon"));
        let ctx = context(Arc::clone(&config));

        assert!(ctx.section().is_none());
        config.set_ready(true);
        assert_eq!(ctx.section().unwrap().get_str("city", ""), "Lyon");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_config_stops_on_cancel() {
        let ctx = context(Arc::new(StaticConfig::new()));
        let token = ctx.token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            token.cancel();
        });
        assert!(!ctx.wait_for_config().await);
        assert!(ctx.is_cancelled());
    }
}
