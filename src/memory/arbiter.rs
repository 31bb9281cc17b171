//! # Memory arbiter: admission control for memory-heavy work.
//!
//! Threads ask the [`MemoryArbiter`] for permission before an operation that
//! needs a burst of heap (fetching and parsing a payload, building a frame).
//! The arbiter compares the current free heap against the request's estimate
//! plus a priority-dependent headroom and records a [`Grant`] when it fits.
//!
//! ## Request flow (default variant)
//! ```text
//! request(op, prio, bytes, owner)
//!   ├─ lock (≤ request_lock_timeout)          → LockTimeout
//!   ├─ no free slot                           → NoFreeSlot
//!   ├─ free ≥ bytes + headroom(prio)          → Granted(GrantId)
//!   └─ otherwise (lock released):
//!        perform_global_cleanup()
//!        loop every poll_interval until wait_timeout:
//!          free ≥ required → relock, recheck slot + headroom → Granted
//!        timeout                              → InsufficientHeap
//! ```
//!
//! The quiet variant takes a shorter lock bound, never runs cleanup and
//! never waits.
//!
//! ## Rules
//! - At most `max_grants` grants are outstanding; slot search is first-empty.
//! - Waiters are not ordered by priority; whoever rechecks first after memory
//!   frees up wins.
//! - The grant lock is never held while waiting, sleeping or running cleanup
//!   callbacks.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{self, Instant};

use super::grant::{Grant, GrantId, GrantTable};
use super::heap::HeapProbe;
use super::priority::{Operation, Priority, Thresholds};
use crate::config::ArbiterConfig;
use crate::error::{panic_message, ArbiterError};

type CleanupFn = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`MemoryArbiter::register_cleanup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CleanupId(u64);

struct CleanupEntry {
    id: u64,
    owner: String,
    handler: CleanupFn,
}

/// Snapshot of the arbiter's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbiterStats {
    /// Free heap at the time of the snapshot.
    pub free_bytes: usize,
    /// Lowest free heap observed since construction.
    pub min_free_bytes: usize,
    /// Outstanding grants.
    pub active_grants: usize,
    /// Size of the grant table.
    pub capacity: usize,
    /// Sum of the byte estimates of outstanding grants.
    pub outstanding_bytes: usize,
    /// Registered cleanup callbacks.
    pub cleanup_callbacks: usize,
    /// When the last global cleanup finished.
    pub last_cleanup: Option<Instant>,
}

/// Priority-based admission control over a shared heap.
///
/// Constructed once and shared as `Arc<MemoryArbiter>`.
pub struct MemoryArbiter {
    config: ArbiterConfig,
    heap: Arc<dyn HeapProbe>,
    low: AtomicUsize,
    critical: AtomicUsize,
    grants: Mutex<GrantTable>,
    cleanups: StdMutex<Vec<CleanupEntry>>,
    next_cleanup: AtomicU64,
    min_free: AtomicUsize,
    last_cleanup: StdMutex<Option<Instant>>,
}

impl MemoryArbiter {
    /// Creates an arbiter reading free heap from `heap`.
    pub fn new(config: ArbiterConfig, heap: Arc<dyn HeapProbe>) -> Self {
        let free = heap.free_bytes();
        let arbiter = Self {
            low: AtomicUsize::new(config.low_threshold),
            critical: AtomicUsize::new(config.critical_threshold),
            grants: Mutex::new(GrantTable::with_capacity(config.max_grants)),
            cleanups: StdMutex::new(Vec::with_capacity(config.max_cleanup_callbacks)),
            next_cleanup: AtomicU64::new(0),
            min_free: AtomicUsize::new(free),
            last_cleanup: StdMutex::new(None),
            heap,
            config,
        };
        arbiter.warn_if_inverted();
        arbiter
    }

    /// Settings this arbiter was built with.
    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    /// Thresholds currently in effect.
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            low: self.low.load(Ordering::Acquire),
            critical: self.critical.load(Ordering::Acquire),
            background_margin: self.config.background_margin,
        }
    }

    /// Changes the low-memory threshold.
    ///
    /// A value below the critical threshold is accepted; admission then uses
    /// the critical threshold as the normal-tier floor.
    pub fn set_low_threshold(&self, bytes: usize) {
        self.low.store(bytes, Ordering::Release);
        log::info!("[arbiter] low threshold set to {bytes} bytes");
        self.warn_if_inverted();
    }

    /// Changes the critical-memory threshold.
    pub fn set_critical_threshold(&self, bytes: usize) {
        self.critical.store(bytes, Ordering::Release);
        log::info!("[arbiter] critical threshold set to {bytes} bytes");
        self.warn_if_inverted();
    }

    fn warn_if_inverted(&self) {
        let th = self.thresholds();
        if th.is_inverted() {
            log::warn!(
                "[arbiter] low threshold {} is below critical {}; normal work uses {} as its floor",
                th.low,
                th.critical,
                th.critical
            );
        }
    }

    /// Current free heap; also feeds the minimum-free watermark.
    pub fn free_heap(&self) -> usize {
        let free = self.heap.free_bytes();
        self.min_free.fetch_min(free, Ordering::AcqRel);
        free
    }

    /// True when free heap is below the low threshold.
    pub fn is_low(&self) -> bool {
        self.free_heap() < self.low.load(Ordering::Acquire)
    }

    /// True when free heap is below the critical threshold.
    pub fn is_critical(&self) -> bool {
        self.free_heap() < self.critical.load(Ordering::Acquire)
    }

    /// Asks for permission to run `operation`.
    ///
    /// On insufficient headroom this runs a global cleanup and then waits
    /// (polling) for up to `wait_timeout` before giving up.
    pub async fn request(
        &self,
        operation: Operation,
        priority: Priority,
        estimated_bytes: usize,
        owner: &str,
    ) -> Result<GrantId, ArbiterError> {
        check_owner(owner)?;
        let required = self.thresholds().required(priority, estimated_bytes);

        {
            let mut table = self
                .lock(self.config.request_lock_timeout)
                .await
                .inspect_err(|e| log::warn!("[arbiter] {owner}: request for {operation} skipped: {e}"))?;

            if !table.has_free_slot() {
                log::warn!(
                    "[arbiter] {owner}: no free grant slot for {operation} ({} outstanding)",
                    table.capacity()
                );
                return Err(ArbiterError::NoFreeSlot {
                    capacity: table.capacity(),
                });
            }

            let free = self.free_heap();
            if free >= required {
                return self.admit(&mut table, operation, priority, estimated_bytes, owner);
            }
            log::warn!(
                "[arbiter] {owner}: {operation} ({priority}) needs {required} bytes, {free} free; running cleanup"
            );
        }

        self.perform_global_cleanup().await;
        self.wait_for_headroom(operation, priority, estimated_bytes, owner, required)
            .await
    }

    /// Fail-fast variant of [`request`](Self::request): short lock bound, no
    /// cleanup, no waiting, trace-level logging only.
    pub async fn request_quiet(
        &self,
        operation: Operation,
        priority: Priority,
        estimated_bytes: usize,
        owner: &str,
    ) -> Result<GrantId, ArbiterError> {
        check_owner(owner)?;
        let required = self.thresholds().required(priority, estimated_bytes);

        let mut table = self
            .lock(self.config.quiet_request_lock_timeout)
            .await
            .inspect_err(|e| log::trace!("[arbiter] {owner}: quiet request skipped: {e}"))?;

        if !table.has_free_slot() {
            log::trace!("[arbiter] {owner}: quiet request for {operation} found no slot");
            return Err(ArbiterError::NoFreeSlot {
                capacity: table.capacity(),
            });
        }

        let free = self.free_heap();
        if free < required {
            log::trace!("[arbiter] {owner}: quiet request for {operation} denied ({free} < {required})");
            return Err(ArbiterError::InsufficientHeap { free, required });
        }
        self.admit(&mut table, operation, priority, estimated_bytes, owner)
    }

    /// Releases the first grant matching `(operation, owner)` and compacts.
    pub async fn release(&self, operation: Operation, owner: &str) -> Result<(), ArbiterError> {
        let mut table = self
            .lock(self.config.release_lock_timeout)
            .await
            .inspect_err(|e| log::warn!("[arbiter] {owner}: release of {operation} skipped: {e}"))?;

        let Some(grant) = table.remove_matching(operation, owner) else {
            log::warn!("[arbiter] {owner}: no outstanding {operation} grant to release");
            return Err(ArbiterError::GrantNotFound);
        };
        drop(table);

        self.heap.compact();
        log::debug!(
            "[arbiter] {owner}: released {operation} after {:?}",
            grant.started.elapsed()
        );
        Ok(())
    }

    /// Quiet counterpart of [`release`](Self::release).
    pub async fn release_quiet(&self, operation: Operation, owner: &str) -> Result<(), ArbiterError> {
        let mut table = self.lock(self.config.quiet_release_lock_timeout).await?;
        if table.remove_matching(operation, owner).is_none() {
            return Err(ArbiterError::GrantNotFound);
        }
        drop(table);
        self.heap.compact();
        Ok(())
    }

    /// Releases the grant identified by `id`.
    pub async fn release_grant(&self, id: GrantId) -> Result<Grant, ArbiterError> {
        let mut table = self.lock(self.config.release_lock_timeout).await?;
        let grant = table.remove(id).ok_or(ArbiterError::GrantNotFound)?;
        drop(table);

        self.heap.compact();
        log::debug!(
            "[arbiter] {}: released {} (slot {})",
            grant.owner,
            grant.operation,
            id.slot()
        );
        Ok(grant)
    }

    /// Adds a callback run during every global cleanup, after the ones
    /// already registered.
    pub fn register_cleanup<F>(&self, owner: &str, handler: F) -> Result<CleanupId, ArbiterError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        check_owner(owner)?;
        let mut table = self.cleanups.lock().unwrap_or_else(PoisonError::into_inner);
        let capacity = self.config.max_cleanup_callbacks;
        if table.len() >= capacity {
            log::warn!("[arbiter] cleanup table full, {owner} not registered");
            return Err(ArbiterError::CleanupTableFull { capacity });
        }

        let id = self.next_cleanup.fetch_add(1, Ordering::Relaxed);
        table.push(CleanupEntry {
            id,
            owner: owner.to_string(),
            handler: Arc::new(handler),
        });
        log::debug!("[arbiter] cleanup callback registered for {owner}");
        Ok(CleanupId(id))
    }

    /// Removes one cleanup callback. Returns `false` if it was already gone.
    pub fn unregister_cleanup(&self, id: CleanupId) -> bool {
        let mut table = self.cleanups.lock().unwrap_or_else(PoisonError::into_inner);
        let before = table.len();
        table.retain(|e| e.id != id.0);
        table.len() != before
    }

    /// Runs every cleanup callback in registration order, then compacts
    /// twice with a short yield in between.
    pub async fn perform_global_cleanup(&self) {
        let callbacks: Vec<(String, CleanupFn)> = {
            let table = self.cleanups.lock().unwrap_or_else(PoisonError::into_inner);
            table
                .iter()
                .map(|e| (e.owner.clone(), Arc::clone(&e.handler)))
                .collect()
        };
        log::info!(
            "[arbiter] global cleanup: {} callbacks, free={}",
            callbacks.len(),
            self.free_heap()
        );

        for (i, (owner, handler)) in callbacks.iter().enumerate() {
            if i > 0 {
                time::sleep(self.config.cleanup_step_delay).await;
            }
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler())) {
                log::error!(
                    "[arbiter] cleanup callback of {owner} panicked: {}",
                    panic_message(&*payload)
                );
            }
        }

        self.heap.compact();
        time::sleep(self.config.compaction_yield).await;
        self.heap.compact();

        *self.last_cleanup.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        log::info!("[arbiter] global cleanup done, free={}", self.free_heap());
    }

    /// Bookkeeping snapshot.
    pub async fn stats(&self) -> Result<ArbiterStats, ArbiterError> {
        let free_bytes = self.free_heap();
        let table = self.lock(self.config.release_lock_timeout).await?;
        Ok(ArbiterStats {
            free_bytes,
            min_free_bytes: self.min_free.load(Ordering::Acquire),
            active_grants: table.len(),
            capacity: table.capacity(),
            outstanding_bytes: table.outstanding_bytes(),
            cleanup_callbacks: self
                .cleanups
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            last_cleanup: *self.last_cleanup.lock().unwrap_or_else(PoisonError::into_inner),
        })
    }

    /// Logs heap figures and every outstanding grant with its age.
    pub async fn log_status(&self, context: &str) {
        let free = self.free_heap();
        let th = self.thresholds();
        let Ok(table) = self.lock(self.config.release_lock_timeout).await else {
            log::warn!("[arbiter] {context}: status unavailable, lock busy");
            return;
        };

        log::info!(
            "[arbiter] {context}: free={free} min_free={} low={} critical={} grants={}/{}",
            self.min_free.load(Ordering::Acquire),
            th.low,
            th.critical,
            table.len(),
            table.capacity()
        );
        let now = Instant::now();
        for g in table.iter() {
            log::info!(
                "[arbiter]   {} {} ({}) {} bytes, held {:?}",
                g.owner,
                g.operation,
                g.priority,
                g.estimated_bytes,
                now.saturating_duration_since(g.started)
            );
        }
    }

    async fn lock(&self, bound: Duration) -> Result<MutexGuard<'_, GrantTable>, ArbiterError> {
        time::timeout(bound, self.grants.lock())
            .await
            .map_err(|_| ArbiterError::LockTimeout { timeout: bound })
    }

    fn admit(
        &self,
        table: &mut GrantTable,
        operation: Operation,
        priority: Priority,
        estimated_bytes: usize,
        owner: &str,
    ) -> Result<GrantId, ArbiterError> {
        let capacity = table.capacity();
        let id = table
            .insert(Grant {
                operation,
                priority,
                estimated_bytes,
                owner: owner.to_string(),
                started: Instant::now(),
            })
            .ok_or(ArbiterError::NoFreeSlot { capacity })?;
        log::debug!(
            "[arbiter] {owner}: granted {operation} ({priority}, {estimated_bytes} bytes) in slot {}",
            id.slot()
        );
        Ok(id)
    }

    async fn wait_for_headroom(
        &self,
        operation: Operation,
        priority: Priority,
        estimated_bytes: usize,
        owner: &str,
        required: usize,
    ) -> Result<GrantId, ArbiterError> {
        let started = Instant::now();
        let deadline = started + self.config.wait_bound().unwrap_or(Duration::ZERO);
        let mut next_status = started + self.config.status_log_interval;

        loop {
            if self.free_heap() >= required {
                let mut table = self.lock(self.config.request_lock_timeout).await?;
                if !table.has_free_slot() {
                    log::warn!("[arbiter] {owner}: headroom recovered but no slot is free");
                    return Err(ArbiterError::NoFreeSlot {
                        capacity: table.capacity(),
                    });
                }
                if self.free_heap() >= required {
                    return self.admit(&mut table, operation, priority, estimated_bytes, owner);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                let free = self.free_heap();
                log::warn!(
                    "[arbiter] {owner}: {operation} ({priority}) denied after {:?}, free={free} required={required}",
                    now - started
                );
                return Err(ArbiterError::InsufficientHeap { free, required });
            }
            if now >= next_status {
                self.log_status(owner).await;
                next_status = now + self.config.status_log_interval;
            }
            time::sleep(self.config.poll_interval_clamped().min(deadline - now)).await;
        }
    }
}

impl std::fmt::Debug for MemoryArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryArbiter")
            .field("thresholds", &self.thresholds())
            .field("free", &self.heap.free_bytes())
            .finish()
    }
}

fn check_owner(owner: &str) -> Result<(), ArbiterError> {
    if owner.is_empty() {
        return Err(ArbiterError::EmptyOwner);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SimulatedHeap;
    use std::sync::Mutex as StdTestMutex;

    fn arbiter(free: usize) -> (Arc<SimulatedHeap>, MemoryArbiter) {
        let heap = Arc::new(SimulatedHeap::new(100_000));
        heap.set_free(free);
        let arb = MemoryArbiter::new(ArbiterConfig::default(), heap.clone());
        (heap, arb)
    }

    async fn active(arb: &MemoryArbiter) -> usize {
        arb.stats().await.unwrap().active_grants
    }

    #[tokio::test(start_paused = true)]
    async fn request_then_release_leaves_count_unchanged() {
        let (_heap, arb) = arbiter(80_000);
        arb.request(Operation::HttpRequest, Priority::Normal, 1_000, "clock")
            .await
            .unwrap();
        let before = active(&arb).await;

        arb.request(Operation::JsonParsing, Priority::Important, 4_000, "weather")
            .await
            .unwrap();
        arb.release(Operation::JsonParsing, "weather").await.unwrap();

        assert_eq!(active(&arb).await, before);
    }

    #[tokio::test(start_paused = true)]
    async fn grant_table_caps_concurrent_grants() {
        let (_heap, arb) = arbiter(80_000);
        let mut ids = Vec::new();
        for i in 0..16 {
            ids.push(
                arb.request(Operation::DataProcessing, Priority::Background, 10, &format!("w{i}"))
                    .await
                    .unwrap(),
            );
        }

        let denied = arb
            .request(Operation::DataProcessing, Priority::Critical, 10, "late")
            .await;
        assert_eq!(denied, Err(ArbiterError::NoFreeSlot { capacity: 16 }));

        arb.release_grant(ids[3]).await.unwrap();
        let id = arb
            .request(Operation::DataProcessing, Priority::Critical, 10, "late")
            .await
            .unwrap();
        assert_eq!(id.slot(), 3);
        assert_eq!(active(&arb).await, 16);
    }

    #[tokio::test(start_paused = true)]
    async fn background_request_denied_after_wait_when_memory_never_frees() {
        let (heap, arb) = arbiter(25_000);
        for i in 0..14 {
            arb.request(Operation::HttpRequest, Priority::Critical, 100, &format!("m{i}"))
                .await
                .unwrap();
        }
        let cleanups = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&cleanups);
        arb.register_cleanup("cache", move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let started = Instant::now();
        let res = arb
            .request(Operation::JsonParsing, Priority::Background, 5_000, "weather")
            .await;

        assert_eq!(
            res,
            Err(ArbiterError::InsufficientHeap {
                free: 25_000,
                required: 35_000
            })
        );
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(32));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(heap.compactions(), 2);
        assert_eq!(active(&arb).await, 14);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_that_frees_memory_admits_the_request() {
        let (heap, arb) = arbiter(10_000);
        let h = Arc::clone(&heap);
        arb.register_cleanup("image-cache", move || h.set_free(60_000)).unwrap();

        let started = Instant::now();
        arb.request(Operation::HttpRequest, Priority::Normal, 8_000, "weather")
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(arb.stats().await.unwrap().last_cleanup.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_is_admitted_once_memory_frees_up() {
        let (heap, arb) = arbiter(10_000);
        let h = Arc::clone(&heap);
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(3)).await;
            h.set_free(50_000);
        });

        let started = Instant::now();
        arb.request(Operation::DisplayUpdate, Priority::Normal, 2_000, "renderer")
            .await
            .unwrap();
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3));
        assert!(waited < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_request_fails_fast_without_cleanup() {
        let (heap, arb) = arbiter(12_000);
        let cleanups = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&cleanups);
        arb.register_cleanup("cache", move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let started = Instant::now();
        let res = arb
            .request_quiet(Operation::DisplayUpdate, Priority::Normal, 1_000, "overlay")
            .await;
        assert_eq!(
            res,
            Err(ArbiterError::InsufficientHeap {
                free: 12_000,
                required: 21_000
            })
        );
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(cleanups.load(Ordering::SeqCst), 0);
        assert_eq!(heap.compactions(), 0);

        arb.request_quiet(Operation::DisplayUpdate, Priority::Critical, 1_000, "overlay")
            .await
            .unwrap();
        arb.release_quiet(Operation::DisplayUpdate, "overlay")
            .await
            .unwrap();
        assert_eq!(heap.compactions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lower_tiers_are_denied_first() {
        let (_heap, arb) = arbiter(25_000);
        let outcomes: Vec<bool> = {
            let mut v = Vec::new();
            for p in Priority::ALL {
                let ok = arb
                    .request_quiet(Operation::DataProcessing, p, 1_000, "sampler")
                    .await
                    .is_ok();
                if ok {
                    arb.release_quiet(Operation::DataProcessing, "sampler").await.unwrap();
                }
                v.push(ok);
            }
            v
        };
        // Background, Normal, Important, Critical
        assert_eq!(outcomes, vec![false, true, true, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn lowering_low_below_critical_keeps_tier_order() {
        let (_heap, arb) = arbiter(9_000);
        arb.set_low_threshold(4_000);
        assert!(arb.thresholds().is_inverted());

        let mut outcomes = Vec::new();
        for p in Priority::ALL {
            let ok = arb
                .request_quiet(Operation::DataProcessing, p, 1_000, "sampler")
                .await
                .is_ok();
            if ok {
                arb.release_quiet(Operation::DataProcessing, "sampler").await.unwrap();
            }
            outcomes.push(ok);
        }
        // Background, Normal, Important, Critical
        assert_eq!(outcomes, vec![false, false, false, true]);

        arb.set_critical_threshold(2_000);
        arb.set_low_threshold(4_000);
        let normal = arb
            .request_quiet(Operation::DataProcessing, Priority::Normal, 1_000, "sampler")
            .await;
        assert!(normal.is_ok());
        let important = arb
            .request_quiet(Operation::HttpRequest, Priority::Important, 1_000, "sampler")
            .await;
        assert!(important.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_runs_in_order_and_survives_a_panic() {
        let (heap, arb) = arbiter(50_000);
        let order = Arc::new(StdTestMutex::new(Vec::new()));

        let o = Arc::clone(&order);
        arb.register_cleanup("first", move || o.lock().unwrap().push("first")).unwrap();
        arb.register_cleanup("faulty", || panic!("cleanup blew up")).unwrap();
        let o = Arc::clone(&order);
        arb.register_cleanup("third", move || o.lock().unwrap().push("third")).unwrap();

        let started = Instant::now();
        arb.perform_global_cleanup().await;

        assert_eq!(*order.lock().unwrap(), vec!["first", "third"]);
        assert_eq!(heap.compactions(), 2);
        // two step pauses plus the compaction yield
        assert_eq!(started.elapsed(), Duration::from_millis(70));
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_table_is_bounded() {
        let (_heap, arb) = arbiter(50_000);
        let mut ids = Vec::new();
        for i in 0..10 {
            ids.push(arb.register_cleanup(&format!("c{i}"), || {}).unwrap());
        }
        assert_eq!(
            arb.register_cleanup("extra", || {}),
            Err(ArbiterError::CleanupTableFull { capacity: 10 })
        );

        assert!(arb.unregister_cleanup(ids[0]));
        assert!(!arb.unregister_cleanup(ids[0]));
        arb.register_cleanup("extra", || {}).unwrap();
        assert_eq!(arb.stats().await.unwrap().cleanup_callbacks, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_owner_and_unknown_release_are_rejected() {
        let (_heap, arb) = arbiter(50_000);
        assert_eq!(
            arb.request(Operation::HttpRequest, Priority::Normal, 1, "").await,
            Err(ArbiterError::EmptyOwner)
        );
        assert_eq!(
            arb.register_cleanup("", || {}),
            Err(ArbiterError::EmptyOwner)
        );
        assert_eq!(
            arb.release(Operation::HttpRequest, "nobody").await,
            Err(ArbiterError::GrantNotFound)
        );

        let id = arb
            .request(Operation::HttpRequest, Priority::Normal, 1, "clock")
            .await
            .unwrap();
        arb.release_grant(id).await.unwrap();
        assert_eq!(arb.release_grant(id).await, Err(ArbiterError::GrantNotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn busy_lock_times_out() {
        let (_heap, arb) = arbiter(50_000);
        let _held = arb.grants.lock().await;

        let res = arb
            .request_quiet(Operation::HttpRequest, Priority::Critical, 1, "clock")
            .await;
        assert_eq!(
            res,
            Err(ArbiterError::LockTimeout {
                timeout: Duration::from_secs(1)
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn thresholds_and_watermark() {
        let (heap, arb) = arbiter(15_000);
        assert!(arb.is_low());
        assert!(!arb.is_critical());

        heap.set_free(8_000);
        assert!(arb.is_critical());

        arb.set_critical_threshold(5_000);
        arb.set_low_threshold(7_000);
        assert!(!arb.is_critical());
        assert!(!arb.is_low());

        heap.set_free(90_000);
        let stats = arb.stats().await.unwrap();
        assert_eq!(stats.free_bytes, 90_000);
        assert_eq!(stats.min_free_bytes, 8_000);
    }
}
