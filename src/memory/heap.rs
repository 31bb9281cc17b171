//! # Free-heap readings.
//!
//! The arbiter never allocates on behalf of callers; it only asks a
//! [`HeapProbe`] how much room is left and, after cleanup, asks it to compact.
//!
//! - [`SimulatedHeap`]: fixed capacity with explicit reserve/free, for tests and the demo.
//! - [`TrackedHeap`]: a byte budget minus what [`TrackingAllocator`](super::TrackingAllocator) reports.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::tracking;

/// Source of free-heap readings.
pub trait HeapProbe: Send + Sync + 'static {
    /// Bytes currently available.
    fn free_bytes(&self) -> usize;

    /// Gives the allocator a chance to return freed memory. Default is a no-op.
    fn compact(&self) {}
}

/// A heap model with a fixed capacity.
#[derive(Debug)]
pub struct SimulatedHeap {
    capacity: usize,
    used: AtomicUsize,
    compactions: AtomicUsize,
}

impl SimulatedHeap {
    /// Creates an empty heap of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: AtomicUsize::new(0),
            compactions: AtomicUsize::new(0),
        }
    }

    /// Total size of the heap.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Marks `bytes` as used. Returns `false` (and changes nothing) if they do not fit.
    pub fn reserve(&self, bytes: usize) -> bool {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|total| *total <= self.capacity)
            })
            .is_ok()
    }

    /// Returns `bytes` to the heap.
    pub fn free(&self, bytes: usize) {
        let _ = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                Some(used.saturating_sub(bytes))
            });
    }

    /// Forces the free reading to `free` bytes.
    pub fn set_free(&self, free: usize) {
        self.used.store(self.capacity.saturating_sub(free), Ordering::Release);
    }

    /// Number of compaction requests received.
    pub fn compactions(&self) -> usize {
        self.compactions.load(Ordering::Acquire)
    }
}

impl HeapProbe for SimulatedHeap {
    fn free_bytes(&self) -> usize {
        self.capacity.saturating_sub(self.used.load(Ordering::Acquire))
    }

    fn compact(&self) {
        self.compactions.fetch_add(1, Ordering::AcqRel);
    }
}

/// Free heap derived from the tracking allocator.
///
/// Only meaningful when [`TrackingAllocator`](super::TrackingAllocator) is the
/// process's global allocator; otherwise the reading stays at `budget`.
#[derive(Debug, Clone, Copy)]
pub struct TrackedHeap {
    budget: usize,
}

impl TrackedHeap {
    /// Treats `budget` bytes as the whole heap.
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }
}

impl HeapProbe for TrackedHeap {
    fn free_bytes(&self) -> usize {
        self.budget.saturating_sub(tracking::allocated_bytes())
    }
}
