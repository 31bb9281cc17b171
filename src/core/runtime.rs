//! # Runtime: the explicitly constructed service container.
//!
//! Owns one instance of every shared service and the lifecycle manager.
//!
//! ```text
//! RuntimeBuilder::build()
//!   ├─ ModuleRegistry (descriptors, read-only from here on)
//!   ├─ EventBus ──► Terminal, LogWriter
//!   ├─ MemoryArbiter (HeapProbe)
//!   ├─ HardwareBus, ActiveModules, ConfigSource
//!   └─ LifecycleManager
//!
//! run_until_shutdown():
//!   start() ─► one thread per module
//!   wait for SIGINT/SIGTERM/SIGQUIT or token.cancel()
//!   shutdown(grace) ─► Ok | GraceExceeded{stuck}
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::builder::RuntimeBuilder;
use super::hardware::HardwareBus;
use super::lifecycle::{LifecycleManager, Services};
use super::readiness::ConfigSource;
use super::renderer::Renderer;
use super::shutdown;
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::events::EventBus;
use crate::input::ButtonClassifier;
use crate::memory::MemoryArbiter;
use crate::modules::{ActiveModules, ModuleRegistry};
use crate::subscribers::{Buzzer, LogWriter, Terminal, Tone};

/// The appliance runtime.
pub struct Runtime {
    cfg: RuntimeConfig,
    services: Services,
    registry: Arc<ModuleRegistry>,
    terminal: Arc<Terminal>,
    lifecycle: LifecycleManager,
    token: CancellationToken,
    _log_writer: Option<LogWriter>,
}

impl Runtime {
    /// Returns a builder with default configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    pub(super) fn new_internal(
        cfg: RuntimeConfig,
        services: Services,
        registry: Arc<ModuleRegistry>,
        terminal: Arc<Terminal>,
        lifecycle: LifecycleManager,
        token: CancellationToken,
        log_writer: Option<LogWriter>,
    ) -> Self {
        Self {
            cfg,
            services,
            registry,
            terminal,
            lifecycle,
            token,
            _log_writer: log_writer,
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &RuntimeConfig {
        &self.cfg
    }

    /// Shared event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.services.bus
    }

    /// Shared memory arbiter.
    pub fn arbiter(&self) -> &Arc<MemoryArbiter> {
        &self.services.arbiter
    }

    /// Exclusive hardware bus lock.
    pub fn hardware(&self) -> &HardwareBus {
        &self.services.hardware
    }

    /// Configuration collaborator.
    pub fn config_source(&self) -> &Arc<dyn ConfigSource> {
        &self.services.config
    }

    /// Running modules.
    pub fn active(&self) -> &ActiveModules {
        &self.services.active
    }

    /// Registered module descriptors.
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// On-screen status log.
    pub fn terminal(&self) -> &Arc<Terminal> {
        &self.terminal
    }

    /// Runtime cancellation token; cancelling it stops every module.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Creates a renderer over this runtime's active list and status log.
    pub fn renderer(&self) -> Renderer {
        Renderer::new(
            &self.services.bus,
            self.services.active.clone(),
            self.services.hardware.clone(),
            Arc::clone(&self.terminal),
        )
    }

    /// Creates a buzzer on this runtime's bus, playing through `sink`.
    ///
    /// The caller drives it with [`Buzzer::run`].
    pub fn buzzer(&self, sink: Arc<dyn Tone>) -> Buzzer {
        Buzzer::attach(&self.services.bus, sink, self.cfg.buzzer.clone())
    }

    /// Creates a press classifier for `button_id` with the configured
    /// thresholds. The caller drives it with [`ButtonClassifier::run`].
    pub fn button(&self, button_id: u8) -> ButtonClassifier {
        ButtonClassifier::new(button_id, &self.cfg.button)
    }

    /// Spawns the module threads. Returns modules that failed to spawn.
    pub fn start(&self) -> Vec<RuntimeError> {
        for line in self.registry.describe() {
            log::info!("[runtime] module {line}");
        }
        self.lifecycle.start_all()
    }

    /// Modules whose threads are still alive.
    pub fn running(&self) -> Vec<String> {
        self.lifecycle.running()
    }

    /// Cancels every module and waits up to the configured grace.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.lifecycle.shutdown(self.cfg.grace).await
    }

    /// Starts the modules, waits for a termination signal (or cancellation
    /// of [`token`](Self::token)), then shuts down.
    pub async fn run_until_shutdown(&self) -> Result<(), RuntimeError> {
        for e in self.start() {
            log::warn!("[runtime] continuing without module: {e}");
        }

        tokio::select! {
            res = shutdown::wait_for_shutdown_signal() => {
                if let Err(e) = res {
                    log::error!("[runtime] cannot listen for signals: {e}; waiting for cancellation");
                    self.token.cancelled().await;
                }
            }
            _ = self.token.cancelled() => {}
        }
        self.shutdown().await
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("modules", &self.registry.len())
            .field("running", &self.running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StaticConfig;
    use crate::error::ModuleError;
    use crate::input::Press;
    use crate::memory::SimulatedHeap;
    use crate::subscribers::Sound;
    use crate::modules::{Layer, ModuleDescriptor, ModuleRef, Stub};
    use std::time::Duration;

    fn stub(name: &'static str, layer: Layer) -> ModuleDescriptor {
        ModuleDescriptor::new(name, name, 1, 4096, move || {
            Ok(Stub::arc(name, layer) as ModuleRef)
        })
    }

    #[test]
    fn duplicate_modules_fail_the_build() {
        let res = Runtime::builder()
            .with_module(stub("Clock", Layer::Base))
            .with_module(stub("Clock", Layer::Overlay))
            .build();
        assert!(matches!(res, Err(RuntimeError::DuplicateModule { .. })));
    }

    #[test]
    fn button_presses_reach_the_buzzer() {
        struct Mute;

        impl Tone for Mute {
            fn start(&self, _frequency_hz: u32, _volume: u8) {}
            fn stop(&self) {}
        }

        let rt = Runtime::builder()
            .with_heap(Arc::new(SimulatedHeap::new(64_000)))
            .build()
            .unwrap();
        let buzzer = rt.buzzer(Arc::new(Mute));
        let button = rt.button(1);

        button.publish(rt.bus(), Press::Long(Duration::from_millis(700)));
        assert_eq!(buzzer.queued(), None);
        button.publish(rt.bus(), Press::Short(Duration::from_millis(80)));
        assert_eq!(buzzer.queued(), Some(Sound::Click));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelling_the_token_ends_run_until_shutdown() {
        let config = Arc::new(StaticConfig::ready());
        let rt = Arc::new(
            RuntimeBuilder::new(RuntimeConfig {
                config_poll_interval: Duration::from_millis(10),
                ..RuntimeConfig::default()
            })
            .with_heap(Arc::new(SimulatedHeap::new(64_000)))
            .with_config_source(config)
            .with_module(stub("Clock", Layer::Base))
            .with_module(stub("Memory", Layer::Overlay))
            .with_module(ModuleDescriptor::new("Broken", "broken", 1, 4096, || {
                Err(ModuleError::instantiation("missing font"))
            }))
            .build()
            .unwrap(),
        );

        let runner = Arc::clone(&rt);
        let handle = tokio::spawn(async move { runner.run_until_shutdown().await });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while rt.active().len() < 2 {
            assert!(tokio::time::Instant::now() < deadline, "modules never started");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(rt.active().names().len(), 2);
        assert!(!rt.active().contains("Broken"));

        rt.token().cancel();
        handle.await.unwrap().unwrap();
        assert!(rt.active().is_empty());
        assert!(rt.running().is_empty());
    }
}
