//! Error types used by the modvisor runtime, its modules and the memory arbiter.
//!
//! This module defines three enums:
//!
//! - [`RuntimeError`] — failures of the lifecycle machinery itself (spawn, shutdown).
//! - [`ModuleError`] — failures raised by a module's factory or hooks.
//! - [`ArbiterError`] — admission and bookkeeping failures of the memory arbiter.
//!
//! All three provide `as_label` for logs. None of them ever crosses a thread
//! boundary as a panic: every cross-component contract returns a status value.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the lifecycle runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The OS refused to create the module thread, or the descriptor cannot be spawned.
    #[error("failed to spawn module '{module}': {reason}")]
    SpawnFailed {
        /// Module display name.
        module: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Shutdown grace period was exceeded; some module threads were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of modules whose threads had not finished.
        stuck: Vec<String>,
    },

    /// A module with the same display name is already registered.
    #[error("module '{module}' is already registered")]
    DuplicateModule {
        /// Module display name.
        module: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use modvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::SpawnFailed { .. } => "runtime_spawn_failed",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::DuplicateModule { .. } => "runtime_duplicate_module",
        }
    }
}

/// # Errors produced by module factories and hooks.
///
/// A module error ends that module's thread only; the rest of the system keeps running.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModuleError {
    /// The factory could not build an instance.
    #[error("instantiation failed: {error}")]
    Instantiation {
        /// The underlying error message.
        error: String,
    },

    /// The configuration section was rejected by `configure_from_section`.
    #[error("configuration rejected: {error}")]
    Config {
        /// The underlying error message.
        error: String,
    },

    /// Unrecoverable internal condition; the run loop gives up.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// A hook panicked; the panic was caught by the thread wrapper.
    #[error("hook panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// The module observed runtime cancellation and stopped.
    #[error("context cancelled")]
    Canceled,
}

impl ModuleError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use modvisor::ModuleError;
    ///
    /// let err = ModuleError::Fatal { error: "sensor gone".into() };
    /// assert_eq!(err.as_label(), "module_fatal");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ModuleError::Instantiation { .. } => "module_instantiation",
            ModuleError::Config { .. } => "module_config",
            ModuleError::Fatal { .. } => "module_fatal",
            ModuleError::Panicked { .. } => "module_panicked",
            ModuleError::Canceled => "module_canceled",
        }
    }

    /// Convenience constructor for [`ModuleError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        ModuleError::Fatal { error: error.into() }
    }

    /// Convenience constructor for [`ModuleError::Instantiation`].
    pub fn instantiation(error: impl Into<String>) -> Self {
        ModuleError::Instantiation { error: error.into() }
    }
}

/// # Errors produced by the memory arbiter.
///
/// Every variant is recoverable: the caller decides whether to skip, retry later or degrade.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArbiterError {
    /// All grant slots are taken.
    #[error("no free grant slot ({capacity} in use)")]
    NoFreeSlot {
        /// Size of the grant table.
        capacity: usize,
    },

    /// Free heap stayed below `estimated + headroom`.
    #[error("insufficient heap: free {free} bytes, required {required} bytes")]
    InsufficientHeap {
        /// Free heap at the time of the final check.
        free: usize,
        /// Estimated bytes plus the priority headroom.
        required: usize,
    },

    /// The arbiter's internal lock could not be taken in time.
    #[error("arbiter lock not acquired within {timeout:?}")]
    LockTimeout {
        /// The lock-wait bound that elapsed.
        timeout: Duration,
    },

    /// No outstanding grant matches the release request.
    #[error("no outstanding grant for release")]
    GrantNotFound,

    /// The cleanup table has no room for another callback.
    #[error("cleanup table full ({capacity} entries)")]
    CleanupTableFull {
        /// Size of the cleanup table.
        capacity: usize,
    },

    /// Owner identifiers must be non-empty.
    #[error("owner name must not be empty")]
    EmptyOwner,
}

impl ArbiterError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ArbiterError::NoFreeSlot { .. } => "arbiter_no_free_slot",
            ArbiterError::InsufficientHeap { .. } => "arbiter_insufficient_heap",
            ArbiterError::LockTimeout { .. } => "arbiter_lock_timeout",
            ArbiterError::GrantNotFound => "arbiter_grant_not_found",
            ArbiterError::CleanupTableFull { .. } => "arbiter_cleanup_table_full",
            ArbiterError::EmptyOwner => "arbiter_empty_owner",
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            ArbiterError::NoFreeSlot { capacity: 16 }.as_label(),
            "arbiter_no_free_slot"
        );
        assert_eq!(ModuleError::Canceled.as_label(), "module_canceled");
        let err = RuntimeError::SpawnFailed {
            module: "Clock".into(),
            reason: "boom".into(),
        };
        assert_eq!(err.as_label(), "runtime_spawn_failed");
        assert_eq!(err.to_string(), "failed to spawn module 'Clock': boom");
    }

    #[test]
    fn panic_message_handles_both_payload_kinds() {
        let static_payload: Box<dyn std::any::Any + Send> = Box::new("static");
        let owned_payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let other_payload: Box<dyn std::any::Any + Send> = Box::new(42_u32);

        assert_eq!(panic_message(&*static_payload), "static");
        assert_eq!(panic_message(&*owned_payload), "owned");
        assert_eq!(panic_message(&*other_payload), "unknown panic");
    }
}
