//! # Module catalogue.
//!
//! [`ModuleRegistry`] holds one [`ModuleDescriptor`] per module kind, in
//! registration order. It is filled before any module thread exists and is
//! read-only afterwards (the runtime only hands out `Arc<ModuleRegistry>`).

use std::fmt;
use std::sync::Arc;

use super::module::ModuleRef;
use crate::error::{ModuleError, RuntimeError};

/// Factory producing a fresh module instance on the module's own thread.
pub type ModuleFactory = Arc<dyn Fn() -> Result<ModuleRef, ModuleError> + Send + Sync>;

/// Declarative description of one module kind.
#[derive(Clone)]
pub struct ModuleDescriptor {
    name: String,
    config_key: String,
    priority: u8,
    stack_bytes: usize,
    factory: ModuleFactory,
}

impl ModuleDescriptor {
    /// Creates a descriptor.
    ///
    /// `priority` is advisory scheduling metadata; `stack_bytes` is the
    /// module's stack budget (zero means it cannot be started).
    pub fn new<F>(
        name: impl Into<String>,
        config_key: impl Into<String>,
        priority: u8,
        stack_bytes: usize,
        factory: F,
    ) -> Self
    where
        F: Fn() -> Result<ModuleRef, ModuleError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            config_key: config_key.into(),
            priority,
            stack_bytes,
            factory: Arc::new(factory),
        }
    }

    /// Display name, also used as the thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration section key.
    pub fn config_key(&self) -> &str {
        &self.config_key
    }

    /// Scheduling priority.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Stack budget in bytes.
    pub fn stack_bytes(&self) -> usize {
        self.stack_bytes
    }

    /// Runs the factory.
    pub fn instantiate(&self) -> Result<ModuleRef, ModuleError> {
        (self.factory)()
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("config_key", &self.config_key)
            .field("priority", &self.priority)
            .field("stack_bytes", &self.stack_bytes)
            .finish()
    }
}

/// Ordered set of module descriptors.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    descriptors: Vec<ModuleDescriptor>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a descriptor. Names must be unique.
    pub fn register(&mut self, descriptor: ModuleDescriptor) -> Result<(), RuntimeError> {
        if self.get(descriptor.name()).is_some() {
            return Err(RuntimeError::DuplicateModule {
                module: descriptor.name,
            });
        }
        log::debug!("[registry] registered {}", descriptor.name());
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Looks a descriptor up by name.
    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Every descriptor, in registration order.
    pub fn all(&self) -> &[ModuleDescriptor] {
        &self.descriptors
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// One human-readable line per descriptor, for startup logs.
    pub fn describe(&self) -> Vec<String> {
        self.descriptors
            .iter()
            .map(|d| {
                format!(
                    "{} (section={}, priority={}, stack={}B)",
                    d.name, d.config_key, d.priority, d.stack_bytes
                )
            })
            .collect()
    }
}
