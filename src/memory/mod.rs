//! Heap admission control.
//!
//! This module arbitrates *permission* to allocate; it never allocates on a
//! caller's behalf.
//!
//! ## Contents
//! - [`MemoryArbiter`] grant table, cleanup callbacks, request/release flows
//! - [`Priority`], [`Operation`], [`Thresholds`] admission policy
//! - [`HeapProbe`] free-heap source, with [`SimulatedHeap`] and [`TrackedHeap`]
//! - [`TrackingAllocator`] global allocator feeding [`TrackedHeap`]
//!
//! ## Typical use
//! ```text
//! let id = arbiter.request(Operation::HttpRequest, Priority::Important, 8_192, "weather").await?;
//! fetch_and_parse().await;
//! arbiter.release_grant(id).await?;
//! ```

mod arbiter;
mod grant;
mod heap;
mod priority;
mod tracking;

pub use arbiter::{ArbiterStats, CleanupId, MemoryArbiter};
pub use grant::{Grant, GrantId};
pub use heap::{HeapProbe, SimulatedHeap, TrackedHeap};
pub use priority::{Operation, Priority, Thresholds};
pub use tracking::{allocated_bytes, AllocationSnapshot, TrackingAllocator};
