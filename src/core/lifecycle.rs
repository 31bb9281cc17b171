//! # Module lifecycle manager.
//!
//! Turns every [`ModuleDescriptor`] in the registry into one OS thread that
//! runs a fixed wrapper on its own current-thread tokio runtime.
//!
//! ## Thread wrapper
//! ```text
//! publish WaitingForConfig
//! ReadinessGate::wait(token) ── cancelled ──► publish Exited, end
//!   │
//!   ▼
//! descriptor.instantiate() ── Err/panic ──► publish Failed, end (this module only)
//!   │
//!   ▼
//! configure / configure_from_section (if the config has a section)
//!   │ section rejected ──► publish Failed, end (never listed)
//!   ▼
//! active.insert(instance) ──► publish Started
//! setup().await ─► run(ctx).await        (panics caught)
//!   │
//!   ▼
//! active.remove(id) ─► drop(instance) ─► publish Exited | Failed
//! ```
//!
//! ## Rules
//! - Thread stack = `max(descriptor budget, RuntimeConfig::min_thread_stack)`.
//! - A zero budget or an OS spawn error is logged and reported; other modules still start.
//! - A module whose run hook returns is not restarted.
//! - Descriptor priority is advisory; OS threads are not re-prioritised.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::hardware::HardwareBus;
use super::readiness::{ConfigSource, ReadinessGate};
use crate::config::RuntimeConfig;
use crate::error::{panic_message, ModuleError, RuntimeError};
use crate::events::{EventBus, LifecyclePhase, ModuleLifecycle};
use crate::memory::MemoryArbiter;
use crate::modules::{ActiveModules, ModuleConfig, ModuleContext, ModuleDescriptor, ModuleRegistry};

/// Shared services every module thread receives.
#[derive(Clone)]
pub struct Services {
    /// Event bus.
    pub bus: Arc<EventBus>,
    /// Memory arbiter.
    pub arbiter: Arc<MemoryArbiter>,
    /// Exclusive hardware bus.
    pub hardware: HardwareBus,
    /// Configuration collaborator.
    pub config: Arc<dyn ConfigSource>,
    /// Renderer-visible list of running modules.
    pub active: ActiveModules,
}

struct ModuleThread {
    name: String,
    handle: thread::JoinHandle<()>,
}

/// Spawns and tracks one thread per registered module.
pub struct LifecycleManager {
    cfg: RuntimeConfig,
    registry: Arc<ModuleRegistry>,
    services: Services,
    token: CancellationToken,
    threads: Mutex<Vec<ModuleThread>>,
    started: AtomicBool,
}

impl LifecycleManager {
    /// Creates a manager; nothing is spawned until [`start_all`](Self::start_all).
    pub fn new(
        cfg: RuntimeConfig,
        registry: Arc<ModuleRegistry>,
        services: Services,
        token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            registry,
            services,
            token,
            threads: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Spawns one thread per descriptor, in registration order.
    ///
    /// Returns the modules that could not be spawned. Only the first call
    /// spawns anything.
    pub fn start_all(&self) -> Vec<RuntimeError> {
        if self.started.swap(true, Ordering::AcqRel) {
            log::warn!("[lifecycle] start_all called twice, ignoring");
            return Vec::new();
        }

        let mut failures = Vec::new();
        for descriptor in self.registry.all() {
            match self.spawn(descriptor) {
                Ok(handle) => self.lock_threads().push(ModuleThread {
                    name: descriptor.name().to_string(),
                    handle,
                }),
                Err(e) => {
                    log::error!("[lifecycle] {e}");
                    self.services.bus.publish(&ModuleLifecycle {
                        module: descriptor.name().to_string(),
                        phase: LifecyclePhase::Failed,
                        reason: Some(e.as_label().to_string()),
                    });
                    failures.push(e);
                }
            }
        }

        log::info!(
            "[lifecycle] {} of {} module threads spawned",
            self.registry.len() - failures.len(),
            self.registry.len()
        );
        failures
    }

    /// Cancels every module and waits up to `grace` for their threads to end.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), RuntimeError> {
        self.token.cancel();
        let deadline = Instant::now() + grace;

        loop {
            let stuck = self.reap();
            if stuck.is_empty() {
                log::info!("[lifecycle] all module threads finished");
                return Ok(());
            }
            if Instant::now() >= deadline {
                log::warn!("[lifecycle] grace {grace:?} exceeded, still running: {stuck:?}");
                return Err(RuntimeError::GraceExceeded { grace, stuck });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Names of modules whose threads are still alive.
    pub fn running(&self) -> Vec<String> {
        self.lock_threads()
            .iter()
            .filter(|t| !t.handle.is_finished())
            .map(|t| t.name.clone())
            .collect()
    }

    /// Runtime cancellation token (parent of every module token).
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    fn spawn(&self, descriptor: &ModuleDescriptor) -> Result<thread::JoinHandle<()>, RuntimeError> {
        let name = descriptor.name().to_string();
        if descriptor.stack_bytes() == 0 {
            return Err(RuntimeError::SpawnFailed {
                module: name,
                reason: "stack budget is zero".into(),
            });
        }

        let stack = self.cfg.thread_stack_for(descriptor.stack_bytes());
        let job = ModuleJob {
            descriptor: descriptor.clone(),
            services: self.services.clone(),
            token: self.token.child_token(),
            poll_interval: self.cfg.config_poll_interval,
        };

        log::debug!(
            "[lifecycle] spawning {name} (priority={}, stack={stack}B)",
            descriptor.priority()
        );
        thread::Builder::new()
            .name(name.clone())
            .stack_size(stack)
            .spawn(move || job.run())
            .map_err(|e| RuntimeError::SpawnFailed {
                module: name,
                reason: e.to_string(),
            })
    }

    /// Joins finished threads and returns the names of the others.
    fn reap(&self) -> Vec<String> {
        let mut threads = self.lock_threads();
        let (done, alive): (Vec<_>, Vec<_>) =
            threads.drain(..).partition(|t| t.handle.is_finished());
        *threads = alive;

        for t in done {
            if t.handle.join().is_err() {
                log::error!("[lifecycle] thread of {} ended with a panic", t.name);
            }
        }
        threads.iter().map(|t| t.name.clone()).collect()
    }

    fn lock_threads(&self) -> std::sync::MutexGuard<'_, Vec<ModuleThread>> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("modules", &self.registry.len())
            .field("running", &self.running())
            .finish()
    }
}

/// Everything one module thread owns.
struct ModuleJob {
    descriptor: ModuleDescriptor,
    services: Services,
    token: CancellationToken,
    poll_interval: Duration,
}

impl ModuleJob {
    fn run(self) {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                log::error!("[{}] cannot build executor: {e}", self.descriptor.name());
                self.publish(LifecyclePhase::Failed, Some("runtime_build_failed".into()));
                return;
            }
        };
        rt.block_on(self.drive());
    }

    async fn drive(self) {
        let name = self.descriptor.name().to_string();
        self.publish(LifecyclePhase::WaitingForConfig, None);

        let gate = ReadinessGate::new(Arc::clone(&self.services.config), self.poll_interval);
        if !gate.wait(&self.token).await {
            log::info!("[{name}] cancelled before configuration was ready");
            self.publish(LifecyclePhase::Exited, Some(ModuleError::Canceled.as_label().into()));
            return;
        }

        let instance = panic::catch_unwind(AssertUnwindSafe(|| self.descriptor.instantiate()))
            .unwrap_or_else(|p| {
                Err(ModuleError::Panicked {
                    info: panic_message(&*p),
                })
            });
        let module = match instance {
            Ok(m) => m,
            Err(e) => {
                log::error!("[{name}] {e}");
                self.publish(LifecyclePhase::Failed, Some(e.as_label().into()));
                return;
            }
        };

        let key = self.descriptor.config_key();
        if let Some(section) = self.services.config.section(key) {
            module.configure(&ModuleConfig::from_section(&section));
            if !module.configure_from_section(&section) {
                let e = ModuleError::Config {
                    error: format!("section '{key}' rejected"),
                };
                log::error!("[{name}] {e}");
                drop(module);
                self.publish(LifecyclePhase::Failed, Some(e.as_label().into()));
                return;
            }
        }

        let id = self.services.active.insert(&name, Arc::clone(&module));
        self.publish(LifecyclePhase::Started, None);
        log::info!("[{name}] started");

        let ctx = ModuleContext::new(
            name.clone(),
            key.to_string(),
            Arc::clone(&self.services.bus),
            Arc::clone(&self.services.arbiter),
            self.services.hardware.clone(),
            Arc::clone(&self.services.config),
            self.token.clone(),
            self.poll_interval,
        );
        let body = async {
            module.setup().await?;
            module.run(ctx).await
        };
        let outcome = AssertUnwindSafe(body)
            .catch_unwind()
            .await
            .unwrap_or_else(|p| {
                Err(ModuleError::Panicked {
                    info: panic_message(&*p),
                })
            });

        self.services.active.remove(id);
        drop(module);

        match outcome {
            Ok(()) | Err(ModuleError::Canceled) => {
                log::info!("[{name}] exited");
                self.publish(LifecyclePhase::Exited, None);
            }
            Err(e) => {
                log::error!("[{name}] {e}");
                self.publish(LifecyclePhase::Failed, Some(e.as_label().into()));
            }
        }
    }

    fn publish(&self, phase: LifecyclePhase, reason: Option<String>) {
        self.services.bus.publish(&ModuleLifecycle {
            module: self.descriptor.name().to_string(),
            phase,
            reason,
        });
    }
}
