//! # Terminal — the on-screen status log
//!
//! Collects [`TerminalEvent`]s into console lines the renderer shows while the
//! appliance is booting or degraded.
//!
//! ## Behavior
//! - Lines are keyed by `(step, group)`; a matching event rewrites the line.
//! - Unknown keys append a new line.
//! - Status text: `Success` → `"OK"`, `Failure` → `"FAIL"`, `Processing` → empty.
//! - `extra` is appended to the line text after a single space.
//!
//! ## Internal scheme
//! ```text
//! on TerminalEvent(ev):
//!   ├─ find line with (ev.step, ev.group) → rewrite text + status
//!   └─ otherwise                          → push new line
//!
//! tail(n) -> Vec<ConsoleLine>  (last n lines, oldest first)
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use crate::events::{EventBus, StepState, TerminalEvent};

/// One rendered status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    /// Step number within the group.
    pub step: i8,
    /// Group tag shown in brackets.
    pub group: String,
    /// Line text.
    pub description: String,
    /// `"OK"`, `"FAIL"`, or empty while in progress.
    pub status: String,
}

impl ConsoleLine {
    /// True while the step has no final status.
    pub fn in_progress(&self) -> bool {
        self.status.is_empty()
    }
}

/// Status log fed by the event bus.
#[derive(Debug)]
pub struct Terminal {
    lines: RwLock<Vec<ConsoleLine>>,
}

impl Terminal {
    /// Creates a terminal seeded with the welcome line.
    #[must_use]
    pub fn new(welcome: &str) -> Self {
        Self {
            lines: RwLock::new(vec![ConsoleLine {
                step: 0,
                group: "SYS".to_string(),
                description: welcome.to_string(),
                status: "OK".to_string(),
            }]),
        }
    }

    /// Creates a terminal and subscribes it to [`TerminalEvent`] on `bus`.
    pub fn attach(bus: &EventBus, welcome: &str) -> Arc<Self> {
        let terminal = Arc::new(Self::new(welcome));
        let sink = Arc::clone(&terminal);
        bus.subscribe(move |ev: &TerminalEvent| sink.apply(ev));
        terminal
    }

    /// Applies one event to the line table.
    pub fn apply(&self, ev: &TerminalEvent) {
        log::debug!("terminal [{}] {}", ev.group, ev.info);

        let status = match ev.state {
            StepState::Success => "OK",
            StepState::Failure => "FAIL",
            StepState::Processing => "",
        };
        let description = match ev.extra.as_deref() {
            Some(extra) if !extra.is_empty() => format!("{} {}", ev.info, extra),
            _ => ev.info.clone(),
        };

        let mut lines = self.lines.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(line) = lines
            .iter_mut()
            .find(|l| l.step == ev.step && l.group == ev.group)
        {
            line.description = description;
            line.status = status.to_string();
            return;
        }
        lines.push(ConsoleLine {
            step: ev.step,
            group: ev.group.clone(),
            description,
            status: status.to_string(),
        });
    }

    /// Returns the last `n` lines, oldest first.
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<ConsoleLine> {
        let lines = self.lines.read().unwrap_or_else(PoisonError::into_inner);
        let start = lines.len().saturating_sub(n);
        lines[start..].to_vec()
    }

    /// Number of lines recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if no line has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
