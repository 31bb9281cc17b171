use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::hardware::HardwareBus;
use super::lifecycle::{LifecycleManager, Services};
use super::readiness::{ConfigSource, StaticConfig};
use super::runtime::Runtime;
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::events::EventBus;
use crate::memory::{HeapProbe, MemoryArbiter, TrackedHeap};
use crate::modules::{ActiveModules, ModuleDescriptor, ModuleRegistry};
use crate::subscribers::{LogWriter, Terminal};

/// Heap budget assumed when no [`HeapProbe`] is supplied.
pub const DEFAULT_HEAP_BUDGET: usize = 320 * 1024;

/// Builder for a [`Runtime`].
///
/// Every shared service is created here once and handed to the parts that
/// need it; nothing is global.
pub struct RuntimeBuilder {
    cfg: RuntimeConfig,
    heap: Option<Arc<dyn HeapProbe>>,
    config: Option<Arc<dyn ConfigSource>>,
    modules: Vec<ModuleDescriptor>,
    welcome: String,
    log_events: bool,
}

impl RuntimeBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(cfg: RuntimeConfig) -> Self {
        Self {
            cfg,
            heap: None,
            config: None,
            modules: Vec::new(),
            welcome: "Welcome".to_string(),
            log_events: true,
        }
    }

    /// Sets the free-heap source. Defaults to a [`TrackedHeap`] of
    /// [`DEFAULT_HEAP_BUDGET`] bytes.
    pub fn with_heap(mut self, heap: Arc<dyn HeapProbe>) -> Self {
        self.heap = Some(heap);
        self
    }

    /// Sets the configuration collaborator. Defaults to an empty, ready [`StaticConfig`].
    pub fn with_config_source(mut self, config: Arc<dyn ConfigSource>) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds a module descriptor; order of calls is registration order.
    pub fn with_module(mut self, descriptor: ModuleDescriptor) -> Self {
        self.modules.push(descriptor);
        self
    }

    /// Text of the first status-log line.
    pub fn with_welcome(mut self, welcome: impl Into<String>) -> Self {
        self.welcome = welcome.into();
        self
    }

    /// Whether a [`LogWriter`] is attached to the bus (default: yes).
    pub fn with_event_logging(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }

    /// Registers the modules and wires every service.
    ///
    /// Fails on duplicate module names.
    pub fn build(self) -> Result<Runtime, RuntimeError> {
        let mut registry = ModuleRegistry::new();
        for descriptor in self.modules {
            registry.register(descriptor)?;
        }
        let registry = Arc::new(registry);

        let heap = self
            .heap
            .unwrap_or_else(|| Arc::new(TrackedHeap::new(DEFAULT_HEAP_BUDGET)));
        let config = self
            .config
            .unwrap_or_else(|| Arc::new(StaticConfig::ready()));

        let bus = Arc::new(EventBus::new());
        let log_writer = self.log_events.then(|| LogWriter::attach(&bus));
        let terminal = Terminal::attach(&bus, &self.welcome);

        let services = Services {
            bus,
            arbiter: Arc::new(MemoryArbiter::new(self.cfg.arbiter.clone(), heap)),
            hardware: HardwareBus::new(),
            config,
            active: ActiveModules::new(),
        };
        let token = CancellationToken::new();
        let lifecycle = LifecycleManager::new(
            self.cfg.clone(),
            Arc::clone(&registry),
            services.clone(),
            token.clone(),
        );

        Ok(Runtime::new_internal(
            self.cfg, services, registry, terminal, lifecycle, token, log_writer,
        ))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
