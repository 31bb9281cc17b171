//! # Active module list.
//!
//! The renderer-visible sequence of running module instances.
//!
//! ## Rules
//! - Only the thread that owns an instance inserts or removes its entry.
//! - Readers use [`ActiveModules::with_entries`] (lock held for the whole
//!   pass) or [`ActiveModules::snapshot`] (cloned handles).
//! - An owning thread removes its entry before dropping the instance, and
//!   removal waits for any in-progress `with_entries` pass, so a draw pass
//!   never sees an instance its owner has already torn down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::module::{Layer, ModuleRef};

/// Identifier of one entry, handed back to the owning thread by `insert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActiveId(u64);

/// One running module.
#[derive(Clone)]
pub struct ActiveEntry {
    /// Entry identifier.
    pub id: ActiveId,
    /// Module display name.
    pub name: String,
    /// Drawing pass, captured at insertion.
    pub layer: Layer,
    /// Shared handle to the instance.
    pub module: ModuleRef,
}

impl std::fmt::Debug for ActiveEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("layer", &self.layer)
            .finish()
    }
}

/// Shared list of running modules. Cloning shares the same list.
#[derive(Clone, Default)]
pub struct ActiveModules {
    entries: Arc<RwLock<Vec<ActiveEntry>>>,
    next_id: Arc<AtomicU64>,
}

impl ActiveModules {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `module` and returns its entry id.
    pub fn insert(&self, name: &str, module: ModuleRef) -> ActiveId {
        let id = ActiveId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let layer = module.layer();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push(ActiveEntry {
            id,
            name: name.to_string(),
            layer,
            module,
        });
        log::debug!("[active] + {name} ({layer:?}), {} running", entries.len());
        id
    }

    /// Removes the entry `id`. Returns `false` if it was not present.
    pub fn remove(&self, id: ActiveId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Some(pos) = entries.iter().position(|e| e.id == id) else {
            return false;
        };
        let entry = entries.remove(pos);
        log::debug!("[active] - {}, {} running", entry.name, entries.len());
        true
    }

    /// Runs `f` over the entries while holding the read lock.
    pub fn with_entries<R>(&self, f: impl FnOnce(&[ActiveEntry]) -> R) -> R {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        f(&entries)
    }

    /// Cloned handles to every entry, in insertion order.
    pub fn snapshot(&self) -> Vec<ActiveEntry> {
        self.with_entries(<[ActiveEntry]>::to_vec)
    }

    /// Names of running modules, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.with_entries(|e| e.iter().map(|e| e.name.clone()).collect())
    }

    /// True if a module called `name` is running.
    pub fn contains(&self, name: &str) -> bool {
        self.with_entries(|e| e.iter().any(|e| e.name == name))
    }

    /// Number of running modules.
    pub fn len(&self) -> usize {
        self.with_entries(<[ActiveEntry]>::len)
    }

    /// True if no module is running.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if at least one module runs and every running module is ready.
    pub fn all_ready(&self) -> bool {
        self.with_entries(|e| !e.is_empty() && e.iter().all(|e| e.module.is_ready()))
    }
}

impl std::fmt::Debug for ActiveModules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveModules")
            .field("names", &self.names())
            .finish()
    }
}
