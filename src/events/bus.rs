//! # Typed, synchronous event bus.
//!
//! [`EventBus`] keeps one insertion-ordered handler list per event type, keyed
//! by [`TypeId`]. `publish` runs every handler for that exact type on the
//! caller's thread, in subscription order, and returns once all of them have
//! been invoked.
//!
//! ## Architecture
//! ```text
//! Publishers (any thread):            Handlers (same thread as publisher):
//!   Input    ──┐
//!   Network  ──┼── publish(&T) ──► [TypeId(T)] ──► h1(&T) ──► h2(&T) ──► ...
//!   Modules  ──┘                        │
//!                                       └─ snapshot taken, lock released before dispatch
//! ```
//!
//! ## Rules
//! - **Exact type**: a handler for `T` only sees `T`.
//! - **Ordering**: handlers for one type fire in subscription order.
//! - **Isolation**: a panicking handler is logged and skipped; the rest still run.
//! - **No queueing**: nothing is buffered, there is no replay and no cross-thread delivery.
//! - **Reentrancy**: the registration lock is not held while handlers run, so a
//!   handler may publish or subscribe.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::event::Event;
use crate::error::panic_message;

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`]; pass it to [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    seq: u64,
}

/// Type-erased view over one per-type handler list.
trait HandlerList: Send + Sync {
    fn remove(&mut self, seq: u64) -> bool;
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Handlers<T: Event> {
    entries: Vec<(u64, Handler<T>)>,
}

impl<T: Event> HandlerList for Handlers<T> {
    fn remove(&mut self, seq: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(s, _)| *s != seq);
        self.entries.len() != before
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// In-process publish/subscribe hub.
///
/// Shared by handle (`Arc<EventBus>`); no global instance exists.
#[derive(Default)]
pub struct EventBus {
    tables: RwLock<HashMap<TypeId, Box<dyn HandlerList>>>,
    next_seq: AtomicU64,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every later `publish` of a `T`.
    pub fn subscribe<T, F>(&self, handler: F) -> SubscriptionId
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let type_id = TypeId::of::<T>();
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let list = tables
            .entry(type_id)
            .or_insert_with(|| Box::new(Handlers::<T> { entries: Vec::new() }));
        if let Some(handlers) = list.as_any_mut().downcast_mut::<Handlers<T>>() {
            handlers.entries.push((seq, Arc::new(handler)));
        }
        log::trace!("subscribed to {} (seq={seq})", T::NAME);
        SubscriptionId { type_id, seq }
    }

    /// Removes a single handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables
            .get_mut(&id.type_id)
            .map(|list| list.remove(id.seq))
            .unwrap_or(false)
    }

    /// Removes every handler registered for `T`.
    pub fn clear<T: Event>(&self) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.remove(&TypeId::of::<T>());
    }

    /// Number of handlers currently registered for `T`.
    pub fn subscriber_count<T: Event>(&self) -> usize {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(&TypeId::of::<T>())
            .map(|list| list.len())
            .unwrap_or(0)
    }

    /// Delivers `event` to every handler subscribed to `T`.
    ///
    /// Returns the number of handlers that completed without panicking.
    pub fn publish<T: Event>(&self, event: &T) -> usize {
        let snapshot = self.snapshot::<T>();
        if snapshot.is_empty() {
            log::trace!("published {} with no subscribers", T::NAME);
            return 0;
        }

        let mut delivered = 0;
        for handler in &snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    log::error!(
                        "handler for {} panicked: {}",
                        T::NAME,
                        panic_message(&*payload)
                    );
                }
            }
        }
        delivered
    }

    fn snapshot<T: Event>(&self) -> Vec<Handler<T>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(&TypeId::of::<T>())
            .and_then(|list| list.as_any().downcast_ref::<Handlers<T>>())
            .map(|h| h.entries.iter().map(|(_, f)| Arc::clone(f)).collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventBus")
            .field("event_types", &tables.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ButtonLongPress, ButtonShortPress, CriticalAlarm};
    use std::sync::Mutex;
    use std::time::Duration;

    fn short(id: u8) -> ButtonShortPress {
        ButtonShortPress {
            button_id: id,
            duration: Duration::from_millis(50),
        }
    }

    #[test]
    fn handlers_fire_once_in_subscription_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |_: &ButtonShortPress| seen.lock().unwrap().push(tag));
        }

        assert_eq!(bus.publish(&short(1)), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);

        assert_eq!(bus.publish(&short(2)), 3);
        assert_eq!(seen.lock().unwrap().len(), 6);
    }

    #[test]
    fn handlers_only_see_their_exact_type() {
        let bus = EventBus::new();
        let short_hits = Arc::new(AtomicU64::new(0));
        let long_hits = Arc::new(AtomicU64::new(0));

        let s = Arc::clone(&short_hits);
        bus.subscribe(move |_: &ButtonShortPress| {
            s.fetch_add(1, Ordering::SeqCst);
        });
        let l = Arc::clone(&long_hits);
        bus.subscribe(move |_: &ButtonLongPress| {
            l.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&ButtonLongPress {
            button_id: 1,
            duration: Duration::from_millis(900),
        });
        assert_eq!(short_hits.load(Ordering::SeqCst), 0);
        assert_eq!(long_hits.load(Ordering::SeqCst), 1);

        assert_eq!(
            bus.publish(&CriticalAlarm {
                message: "hot".into(),
                severity: 3
            }),
            0
        );
        assert_eq!(short_hits.load(Ordering::SeqCst), 0);
        assert_eq!(long_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_does_not_block_the_rest() {
        let bus = EventBus::new();
        let after = Arc::new(AtomicU64::new(0));

        bus.subscribe(|_: &ButtonShortPress| panic!("faulty subscriber"));
        let a = Arc::clone(&after);
        bus.subscribe(move |_: &ButtonShortPress| {
            a.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(&short(1)), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);

        // The faulty handler stays registered and keeps being isolated.
        assert_eq!(bus.publish(&short(1)), 1);
        assert_eq!(after.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_removes_only_that_handler() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let h = Arc::clone(&hits);
        let first = bus.subscribe(move |_: &ButtonShortPress| h.lock().unwrap().push(1));
        let h = Arc::clone(&hits);
        bus.subscribe(move |_: &ButtonShortPress| h.lock().unwrap().push(2));

        assert!(bus.unsubscribe(first));
        assert!(!bus.unsubscribe(first));
        assert_eq!(bus.subscriber_count::<ButtonShortPress>(), 1);

        bus.publish(&short(1));
        assert_eq!(*hits.lock().unwrap(), vec![2]);
    }

    #[test]
    fn clear_drops_all_handlers_of_one_type() {
        let bus = EventBus::new();
        bus.subscribe(|_: &ButtonShortPress| {});
        bus.subscribe(|_: &ButtonShortPress| {});
        bus.subscribe(|_: &ButtonLongPress| {});

        bus.clear::<ButtonShortPress>();
        assert_eq!(bus.subscriber_count::<ButtonShortPress>(), 0);
        assert_eq!(bus.subscriber_count::<ButtonLongPress>(), 1);
        assert_eq!(bus.publish(&short(1)), 0);
    }

    #[test]
    fn handler_may_subscribe_while_being_dispatched() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe(move |_: &ButtonShortPress| {
            inner.subscribe(|_: &ButtonLongPress| {});
        });

        assert_eq!(bus.publish(&short(1)), 1);
        assert_eq!(bus.subscriber_count::<ButtonLongPress>(), 1);
    }
}
