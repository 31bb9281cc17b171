//! # modvisor
//!
//! **Modvisor** is the runtime backbone of a memory-constrained, multi-threaded
//! display appliance. Independently scheduled threads (input, audio, display,
//! connectivity and dashboard "widget" modules) share one CPU, one small heap
//! and one exclusive hardware bus, and must survive faults without taking the
//! whole appliance down.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Descriptor  │   │  Descriptor  │   │  Descriptor  │
//!     │   (Clock)    │   │  (Weather)   │   │  (Overlay)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Runtime (explicit service container)                             │
//! │  - ModuleRegistry (static catalogue)                              │
//! │  - EventBus (typed, synchronous fan-out)                          │
//! │  - MemoryArbiter (heap admission control)                         │
//! │  - ActiveModules (renderer-visible running list)                  │
//! │  - HardwareBus (exclusive lock)                                   │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               ▼
//!   OS thread          OS thread          OS thread        Renderer
//!   (own executor)     (own executor)     (own executor)   (Base pass,
//!    │ wait config      │ wait config      │ wait config     Overlay pass)
//!    │ request grant    │ publish events   │ draw overlay
//!    ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │        EventBus ──► Terminal, Buzzer, LogWriter, handlers         │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Module lifecycle
//! ```text
//! ReadinessGate ──► instantiate ──► ActiveModules.insert ──► setup ──► run
//!                       │                                             │
//!                       └─ Err: Failed (this module only)             ▼
//!                                          ActiveModules.remove ──► drop ──► Exited | Failed
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Events**        | Typed publish/subscribe with per-handler panic isolation | [`EventBus`], [`Event`]                     |
//! | **Memory**        | Priority-based admission of memory-heavy operations      | [`MemoryArbiter`], [`Priority`], [`HeapProbe`] |
//! | **Modules**       | Widget contract, catalogue, running list                 | [`Module`], [`ModuleRegistry`], [`ActiveModules`] |
//! | **Lifecycle**     | One thread per module, readiness gate, graceful shutdown | [`LifecycleManager`], [`Runtime`]           |
//! | **Rendering**     | Terminal / dashboard modes, overlays drawn last          | [`Renderer`], [`Canvas`]                    |
//! | **Peripherals**   | Button press classification, buzzer sound queue          | [`ButtonClassifier`], [`Buzzer`], [`Tone`]  |
//! | **Errors**        | Typed errors with stable log labels                      | [`RuntimeError`], [`ModuleError`], [`ArbiterError`] |
//! | **Configuration** | Timing and threshold settings                            | [`RuntimeConfig`], [`ArbiterConfig`]        |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use modvisor::{Runtime, SimulatedHeap};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = Runtime::builder()
//!         .with_heap(Arc::new(SimulatedHeap::new(160 * 1024)))
//!         // .with_module(ModuleDescriptor::new("Clock", "clock", 5, 4096, make_clock))
//!         .build()?;
//!
//!     runtime.run_until_shutdown().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod input;
mod memory;
mod modules;
mod subscribers;

// ---- Public re-exports ----

pub use crate::config::{ArbiterConfig, ButtonConfig, BuzzerConfig, RuntimeConfig};
pub use crate::core::{
    wait_for_shutdown_signal, ConfigSource, DisplayMode, HardwareBus, HardwareGuard,
    LifecycleManager, ReadinessGate, Renderer, Runtime, RuntimeBuilder, Services, StaticConfig,
    DEFAULT_HEAP_BUDGET, TERMINAL_TAIL,
};
pub use crate::error::{ArbiterError, ModuleError, RuntimeError};
pub use crate::events::{
    ButtonLongPress, ButtonShortPress, ConnectivityChanged, CriticalAlarm, CriticalAlarmOff, Event,
    EventBus, LifecyclePhase, ModuleLifecycle, StepState, SubscriptionId, TerminalEvent,
};
pub use crate::memory::{
    allocated_bytes, AllocationSnapshot, ArbiterStats, CleanupId, Grant, GrantId, HeapProbe,
    MemoryArbiter, Operation, Priority, SimulatedHeap, Thresholds, TrackedHeap, TrackingAllocator,
};
pub use crate::modules::{
    ActiveEntry, ActiveId, ActiveModules, Canvas, ConfigSection, DrawOp, Layer, Module,
    ModuleConfig, ModuleContext, ModuleDescriptor, ModuleFactory, ModuleRef, ModuleRegistry,
    RecordingCanvas,
};
pub use crate::input::{ButtonClassifier, ButtonLine, Press};
pub use crate::subscribers::{Beep, Buzzer, ConsoleLine, LogWriter, Sound, Terminal, Tone};
