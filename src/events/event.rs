//! # Event records published on the [`EventBus`](super::EventBus).
//!
//! Every event is an immutable value type implementing [`Event`]. Identity is the
//! concrete type: a handler subscribed to [`ButtonShortPress`] never sees a
//! [`ButtonLongPress`], even though both carry the same fields.
//!
//! The set is closed for the built-in producers (input, connectivity, alarms,
//! status log, module lifecycle) and open for extension: any
//! `Send + Sync + 'static` type implementing [`Event`] can be published.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use modvisor::{EventBus, ButtonShortPress};
//!
//! let bus = EventBus::new();
//! bus.subscribe(|ev: &ButtonShortPress| assert_eq!(ev.button_id, 1));
//! let delivered = bus.publish(&ButtonShortPress { button_id: 1, duration: Duration::from_millis(80) });
//! assert_eq!(delivered, 1);
//! ```

use std::time::Duration;

/// Marker for values that can travel over the bus.
pub trait Event: Send + Sync + 'static {
    /// Stable name used in logs.
    const NAME: &'static str;
}

/// A button was pressed and released before the long-press threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonShortPress {
    /// Hardware button identifier.
    pub button_id: u8,
    /// How long the button was held.
    pub duration: Duration,
}

impl Event for ButtonShortPress {
    const NAME: &'static str = "button_short_press";
}

/// A button was held at least as long as the long-press threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonLongPress {
    /// Hardware button identifier.
    pub button_id: u8,
    /// How long the button was held.
    pub duration: Duration,
}

impl Event for ButtonLongPress {
    const NAME: &'static str = "button_long_press";
}

/// An alarm condition was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalAlarm {
    /// Text shown to the user.
    pub message: String,
    /// Producer-defined severity, higher is worse.
    pub severity: u8,
}

impl Event for CriticalAlarm {
    const NAME: &'static str = "critical_alarm";
}

/// A previously raised alarm was cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalAlarmOff {
    /// Why the alarm ended.
    pub reason: String,
}

impl Event for CriticalAlarmOff {
    const NAME: &'static str = "critical_alarm_off";
}

/// Progress of one step shown on the status log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Still in progress; rendered with an animated marker.
    Processing,
    /// Finished successfully.
    Success,
    /// Finished with an error.
    Failure,
}

/// Status-log line update.
///
/// Lines are keyed by `(step, group)`: a second event with the same key
/// rewrites the line instead of appending a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalEvent {
    /// Step number within the group.
    pub step: i8,
    /// Short group tag, e.g. `"WIFI"`.
    pub group: String,
    /// Line text.
    pub info: String,
    /// Step outcome.
    pub state: StepState,
    /// Optional detail appended to `info`.
    pub extra: Option<String>,
}

impl TerminalEvent {
    /// Creates an event without extra detail.
    pub fn new(step: i8, group: impl Into<String>, info: impl Into<String>, state: StepState) -> Self {
        Self {
            step,
            group: group.into(),
            info: info.into(),
            state,
            extra: None,
        }
    }

    /// Attaches extra detail.
    #[must_use]
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }
}

impl Event for TerminalEvent {
    const NAME: &'static str = "terminal";
}

/// Network connectivity changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityChanged {
    /// Link is up.
    pub connected: bool,
    /// Network identifier (SSID or similar).
    pub network: String,
}

impl Event for ConnectivityChanged {
    const NAME: &'static str = "connectivity_changed";
}

/// Phase reached by a module thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Thread spawned, blocked on the readiness gate.
    WaitingForConfig,
    /// Instance created and appended to the active list.
    Started,
    /// Run hook returned; instance removed and destroyed.
    Exited,
    /// Factory, setup or run reported an error or panicked.
    Failed,
}

/// Module lifecycle notification published by the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLifecycle {
    /// Module display name.
    pub module: String,
    /// Phase reached.
    pub phase: LifecyclePhase,
    /// Error label for `Failed`, or why the thread ended before starting.
    pub reason: Option<String>,
}

impl Event for ModuleLifecycle {
    const NAME: &'static str = "module_lifecycle";
}
