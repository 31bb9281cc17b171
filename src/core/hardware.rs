//! # Exclusive hardware bus.
//!
//! The display and the storage card share one bus. Every user takes this
//! lock for the duration of a transfer; the wait is unbounded, since losing
//! the bus leaves the appliance with no way to recover.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

/// Shared lock over the hardware bus. Cloning shares the same lock.
#[derive(Clone, Debug, Default)]
pub struct HardwareBus {
    lock: Arc<Mutex<()>>,
}

/// Proof of exclusive bus access; released on drop.
pub type HardwareGuard<'a> = MutexGuard<'a, ()>;

impl HardwareBus {
    /// Creates a free bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits (without bound) for exclusive access.
    pub async fn acquire(&self) -> HardwareGuard<'_> {
        self.lock.lock().await
    }

    /// Takes the bus only if it is free right now.
    pub fn try_acquire(&self) -> Option<HardwareGuard<'_>> {
        self.lock.try_lock().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn access_is_exclusive() {
        let bus = HardwareBus::new();
        let other = bus.clone();

        let guard = bus.acquire().await;
        assert!(other.try_acquire().is_none());
        drop(guard);
        assert!(other.try_acquire().is_some());
    }
}
