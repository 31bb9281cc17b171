//! Runtime events: value types and the typed bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe between producers (input, connectivity, modules, the
//! lifecycle manager) and consumers (audio, the on-screen status log, logging).
//!
//! ## Contents
//! - [`Event`] marker trait and the built-in event records
//! - [`EventBus`] synchronous per-type fan-out
//!
//! See `core/mod.rs` for the system-level wiring diagram.

mod bus;
mod event;

pub use bus::{EventBus, SubscriptionId};
pub use event::{
    ButtonLongPress, ButtonShortPress, ConnectivityChanged, CriticalAlarm, CriticalAlarmOff, Event,
    LifecyclePhase, ModuleLifecycle, StepState, TerminalEvent,
};
