//! # Frame composition.
//!
//! Each frame the renderer takes the hardware bus and picks a mode:
//!
//! ```text
//! connected && every active module ready ──► Dashboard
//!   pass 1: Base entries    (list order)
//!   pass 2: Overlay entries (list order)
//! otherwise ──────────────────────────────► Terminal (last lines of the status log)
//! ```
//!
//! The active list's read lock is held for the whole dashboard pass, so a
//! module thread cannot remove (and then drop) its instance mid-draw.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::hardware::HardwareBus;
use crate::events::{ConnectivityChanged, EventBus, SubscriptionId};
use crate::modules::{ActiveModules, Canvas, Layer};
use crate::subscribers::Terminal;

/// Lines of the status log shown in terminal mode.
pub const TERMINAL_TAIL: usize = 6;
const LINE_HEIGHT: i32 = 10;

/// What a frame shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Boot / degraded status log.
    Terminal,
    /// Module widgets.
    Dashboard,
}

/// Draws frames from the active list and the status log.
///
/// Dropping the renderer removes its connectivity subscription.
pub struct Renderer {
    active: ActiveModules,
    hardware: HardwareBus,
    terminal: Arc<Terminal>,
    connected: Arc<AtomicBool>,
    bus: Arc<EventBus>,
    subscription: SubscriptionId,
}

impl Renderer {
    /// Creates a renderer and subscribes it to [`ConnectivityChanged`].
    pub fn new(
        bus: &Arc<EventBus>,
        active: ActiveModules,
        hardware: HardwareBus,
        terminal: Arc<Terminal>,
    ) -> Self {
        let connected = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&connected);
        let subscription = bus.subscribe(move |e: &ConnectivityChanged| {
            flag.store(e.connected, Ordering::Release)
        });
        Self {
            active,
            hardware,
            terminal,
            connected,
            bus: Arc::clone(bus),
            subscription,
        }
    }

    /// Mode the next frame will use.
    pub fn mode(&self) -> DisplayMode {
        if self.connected.load(Ordering::Acquire) && self.active.all_ready() {
            DisplayMode::Dashboard
        } else {
            DisplayMode::Terminal
        }
    }

    /// Draws one frame while holding the hardware bus.
    pub async fn draw_frame(&self, canvas: &mut (dyn Canvas + Send)) -> DisplayMode {
        let _bus = self.hardware.acquire().await;
        let mode = self.mode();
        match mode {
            DisplayMode::Terminal => self.draw_terminal(canvas),
            DisplayMode::Dashboard => self.draw_dashboard(canvas),
        }
        mode
    }

    /// Two-pass draw: base modules first, overlays last.
    ///
    /// Callers outside [`draw_frame`](Self::draw_frame) must hold the hardware bus.
    pub fn draw_dashboard(&self, canvas: &mut dyn Canvas) {
        self.active.with_entries(|entries| {
            for layer in [Layer::Base, Layer::Overlay] {
                for entry in entries.iter().filter(|e| e.layer == layer) {
                    entry.module.draw(canvas);
                }
            }
        });
    }

    /// Draws the tail of the status log, one line per row.
    pub fn draw_terminal(&self, canvas: &mut dyn Canvas) {
        for (row, line) in (0i32..).zip(self.terminal.tail(TERMINAL_TAIL)) {
            let text = if line.status.is_empty() {
                format!("[{}] {}", line.group, line.description)
            } else {
                format!("[{}] {} {}", line.group, line.description, line.status)
            };
            canvas.text(0, row * LINE_HEIGHT, &text);
        }
    }

    /// Draws frames every `interval` until `token` is cancelled.
    pub async fn run<C: Canvas + Send>(
        &self,
        canvas: &mut C,
        interval: Duration,
        token: &CancellationToken,
    ) {
        let interval = interval.max(Duration::from_millis(1));
        let mut last = None;
        loop {
            let mode = self.draw_frame(canvas).await;
            if last != Some(mode) {
                log::info!("[renderer] display mode {mode:?}");
                last = Some(mode);
            }
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscription);
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("mode", &self.mode())
            .finish()
    }
}
