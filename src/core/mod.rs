//! Runtime core: module threads, readiness, rendering and wiring.
//!
//! ## System wiring
//! ```text
//!                 ┌──────────────────── Runtime ─────────────────────┐
//!                 │ ModuleRegistry   EventBus   MemoryArbiter        │
//!                 │ ActiveModules    HardwareBus  ConfigSource       │
//!                 └───────┬──────────────────────────────┬───────────┘
//!                         ▼                              ▼
//!                 LifecycleManager                    Renderer
//!        ┌──────────────┼──────────────┐      reads ActiveModules + Terminal
//!        ▼              ▼              ▼      under the HardwareBus lock
//!   thread "Clock"  thread "Weather" thread "Overlay"
//!   ReadinessGate → instantiate → insert → setup → run → remove
//!        │ publish ModuleLifecycle / TerminalEvent
//!        │ request / release grants
//!        ▼
//!   EventBus ──► Terminal, LogWriter, user handlers
//! ```
//!
//! Internal modules:
//! - `readiness`: [`ConfigSource`], [`StaticConfig`], [`ReadinessGate`];
//! - `lifecycle`: [`LifecycleManager`] and the per-thread wrapper;
//! - `hardware`: [`HardwareBus`] exclusive lock;
//! - `renderer`: [`Renderer`], two-pass dashboard and terminal mode;
//! - `builder` / `runtime`: [`RuntimeBuilder`], [`Runtime`];
//! - `shutdown`: OS signal wait.

mod builder;
mod hardware;
mod lifecycle;
mod readiness;
mod renderer;
mod runtime;
mod shutdown;

pub use builder::{RuntimeBuilder, DEFAULT_HEAP_BUDGET};
pub use hardware::{HardwareBus, HardwareGuard};
pub use lifecycle::{LifecycleManager, Services};
pub use readiness::{ConfigSource, ReadinessGate, StaticConfig};
pub use renderer::{DisplayMode, Renderer, TERMINAL_TAIL};
pub use runtime::Runtime;
pub use shutdown::wait_for_shutdown_signal;
