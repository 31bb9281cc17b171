//! # Heap accounting allocator.
//!
//! [`TrackingAllocator`] wraps another [`GlobalAlloc`] and keeps process-wide
//! byte counters that [`TrackedHeap`](super::TrackedHeap) turns into a
//! free-heap reading.
//!
//! ```rust,ignore
//! use modvisor::TrackingAllocator;
//!
//! #[global_allocator]
//! static GLOBAL: TrackingAllocator = TrackingAllocator::new(std::alloc::System);
//! ```
//!
//! Counters saturate instead of wrapping. Nothing in this file allocates or
//! logs, since it runs inside the allocator itself.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

static ALLOCATED_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_ALLOCATED_BYTES: AtomicUsize = AtomicUsize::new(0);
static TOTAL_ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static TOTAL_DEALLOCATIONS: AtomicU64 = AtomicU64::new(0);

/// Point-in-time copy of the allocator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationSnapshot {
    /// Bytes currently allocated through the tracking allocator.
    pub allocated_bytes: usize,
    /// Highest value `allocated_bytes` ever reached.
    pub peak_allocated_bytes: usize,
    /// Number of successful allocations.
    pub total_allocations: u64,
    /// Number of deallocations.
    pub total_deallocations: u64,
}

impl AllocationSnapshot {
    /// Reads the current counters.
    pub fn now() -> Self {
        Self {
            allocated_bytes: ALLOCATED_BYTES.load(Ordering::Relaxed),
            peak_allocated_bytes: PEAK_ALLOCATED_BYTES.load(Ordering::Relaxed),
            total_allocations: TOTAL_ALLOCATIONS.load(Ordering::Relaxed),
            total_deallocations: TOTAL_DEALLOCATIONS.load(Ordering::Relaxed),
        }
    }

    /// Allocations not yet freed.
    pub fn live_allocations(&self) -> u64 {
        self.total_allocations.saturating_sub(self.total_deallocations)
    }
}

/// Bytes currently allocated through the tracking allocator.
pub fn allocated_bytes() -> usize {
    ALLOCATED_BYTES.load(Ordering::Relaxed)
}

fn add_bytes(size: usize) {
    let prev = ALLOCATED_BYTES
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
            Some(cur.saturating_add(size))
        })
        .unwrap_or(0);
    PEAK_ALLOCATED_BYTES.fetch_max(prev.saturating_add(size), Ordering::Relaxed);
}

fn sub_bytes(size: usize) {
    let _ = ALLOCATED_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
        Some(cur.saturating_sub(size))
    });
}

/// A [`GlobalAlloc`] wrapper that counts bytes in flight.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackingAllocator<A = System> {
    inner: A,
}

impl<A> TrackingAllocator<A> {
    /// Wraps `inner`.
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    /// # Safety
    ///
    /// Same contract as [`GlobalAlloc::alloc`]: `layout` must have a
    /// non-zero size.
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc(layout);
        if !ptr.is_null() {
            add_bytes(layout.size());
            TOTAL_ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        }
        ptr
    }

    /// # Safety
    ///
    /// `ptr` must come from this allocator and `layout` must be the layout it
    /// was allocated with.
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        sub_bytes(layout.size());
        TOTAL_DEALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        self.inner.dealloc(ptr, layout);
    }

    /// # Safety
    ///
    /// As for [`alloc`](Self::alloc).
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc_zeroed(layout);
        if !ptr.is_null() {
            add_bytes(layout.size());
            TOTAL_ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        }
        ptr
    }

    /// # Safety
    ///
    /// Same contract as [`GlobalAlloc::realloc`]: `ptr` must come from this
    /// allocator with `layout`, and `new_size` must be non-zero and must not
    /// overflow `isize` when rounded up to `layout.align()`.
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = self.inner.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            let old_size = layout.size();
            if new_size > old_size {
                add_bytes(new_size - old_size);
            } else {
                sub_bytes(old_size - new_size);
            }
        }
        new_ptr
    }
}
