//! # Global runtime configuration.
//!
//! Provides [`RuntimeConfig`] (lifecycle, rendering, shutdown),
//! [`ArbiterConfig`] (memory admission thresholds and timing) and the two
//! peripheral settings [`ButtonConfig`] and [`BuzzerConfig`].
//!
//! Both are plain structs with public fields and a documented [`Default`].
//! The defaults mirror the appliance firmware: a 16-slot grant table,
//! 20 KB / 10 KB low / critical heap thresholds and a one-second
//! configuration poll.
//!
//! ## Sentinel values
//! - `ArbiterConfig::wait_timeout = 0s` → denied requests do not wait after cleanup
//! - `RuntimeConfig::frame_interval = 0s` → clamped to 1 ms by the renderer

use std::time::Duration;

/// Configuration for the lifecycle runtime.
///
/// ## Field semantics
/// - `config_poll_interval`: how often the readiness gate re-checks the configuration collaborator
/// - `min_thread_stack`: host floor applied to every descriptor's stack budget
/// - `frame_interval`: delay between two renderer frames
/// - `grace`: how long `shutdown` waits for module threads
/// - `arbiter`: memory arbiter settings
/// - `button` / `buzzer`: input classification and sound playback
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Interval at which module threads poll configuration readiness.
    pub config_poll_interval: Duration,

    /// Smallest stack handed to a module thread, whatever its descriptor asks for.
    ///
    /// Descriptor budgets are sized for the firmware target; a host thread
    /// running its own executor needs more room.
    pub min_thread_stack: usize,

    /// Delay between renderer frames.
    pub frame_interval: Duration,

    /// Maximum time `shutdown` waits for module threads to exit.
    pub grace: Duration,

    /// Memory arbiter settings.
    pub arbiter: ArbiterConfig,

    /// Button sampling and long-press threshold.
    pub button: ButtonConfig,

    /// Buzzer tick and volume.
    pub buzzer: BuzzerConfig,
}

impl RuntimeConfig {
    /// Effective stack size for a descriptor budget.
    #[inline]
    pub fn thread_stack_for(&self, budget: usize) -> usize {
        budget.max(self.min_thread_stack)
    }

    /// Frame interval clamped to at least one millisecond.
    #[inline]
    pub fn frame_interval_clamped(&self) -> Duration {
        self.frame_interval.max(Duration::from_millis(1))
    }
}

impl Default for RuntimeConfig {
    /// Default configuration:
    ///
    /// - `config_poll_interval = 1s`
    /// - `min_thread_stack = 256 KiB`
    /// - `frame_interval = 25ms` (the display refresh cadence)
    /// - `grace = 5s`
    /// - `arbiter`, `button`, `buzzer`: their own defaults
    fn default() -> Self {
        Self {
            config_poll_interval: Duration::from_secs(1),
            min_thread_stack: 256 * 1024,
            frame_interval: Duration::from_millis(25),
            grace: Duration::from_secs(5),
            arbiter: ArbiterConfig::default(),
            button: ButtonConfig::default(),
            buzzer: BuzzerConfig::default(),
        }
    }
}

/// Settings for the [`ButtonClassifier`](crate::ButtonClassifier).
#[derive(Clone, Debug)]
pub struct ButtonConfig {
    /// Presses held at least this long are long presses.
    pub long_press: Duration,
    /// Sampling interval of the button line.
    pub poll_interval: Duration,
}

impl Default for ButtonConfig {
    /// `long_press = 300ms`, `poll_interval = 50ms`.
    fn default() -> Self {
        Self {
            long_press: Duration::from_millis(300),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Settings for the [`Buzzer`](crate::Buzzer).
#[derive(Clone, Debug)]
pub struct BuzzerConfig {
    /// How often the player checks for a queued sound; also the gap between
    /// the beeps of a multi-beep sound.
    pub tick: Duration,
    /// Duty level handed to the tone sink, 0..=255.
    pub volume: u8,
}

impl Default for BuzzerConfig {
    /// `tick = 200ms`, `volume = 200`.
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            volume: 200,
        }
    }
}

/// Configuration for the [`MemoryArbiter`](crate::MemoryArbiter).
#[derive(Clone, Debug)]
pub struct ArbiterConfig {
    /// Free heap below which memory is considered low.
    ///
    /// Expected to be at least `critical_threshold`; a lower value is
    /// treated as `critical_threshold` when sizing normal-tier headroom.
    pub low_threshold: usize,
    /// Free heap below which memory is considered critical.
    pub critical_threshold: usize,
    /// Extra headroom demanded from background work on top of `low_threshold`.
    pub background_margin: usize,
    /// Size of the grant table (hard cap on outstanding grants).
    pub max_grants: usize,
    /// Size of the cleanup callback table.
    pub max_cleanup_callbacks: usize,

    /// Lock-wait bound for `request`.
    pub request_lock_timeout: Duration,
    /// Lock-wait bound for `release`.
    pub release_lock_timeout: Duration,
    /// Lock-wait bound for `request_quiet`.
    pub quiet_request_lock_timeout: Duration,
    /// Lock-wait bound for `release_quiet`.
    pub quiet_release_lock_timeout: Duration,

    /// How long a denied request keeps polling after global cleanup.
    pub wait_timeout: Duration,
    /// Poll interval while waiting for headroom.
    pub poll_interval: Duration,
    /// Status log cadence while waiting.
    pub status_log_interval: Duration,
    /// Pause between two cleanup callbacks.
    pub cleanup_step_delay: Duration,
    /// Yield between the two compaction rounds of a global cleanup.
    pub compaction_yield: Duration,
}

impl ArbiterConfig {
    /// Returns the post-cleanup wait bound as an `Option`.
    ///
    /// - `None` → denied requests fail right after cleanup
    /// - `Some(d)` → poll for up to `d`
    #[inline]
    pub fn wait_bound(&self) -> Option<Duration> {
        if self.wait_timeout == Duration::ZERO {
            None
        } else {
            Some(self.wait_timeout)
        }
    }

    /// Poll interval clamped to at least one millisecond.
    #[inline]
    pub fn poll_interval_clamped(&self) -> Duration {
        self.poll_interval.max(Duration::from_millis(1))
    }
}

impl Default for ArbiterConfig {
    /// Default configuration:
    ///
    /// - `low_threshold = 20_000`, `critical_threshold = 10_000`, `background_margin = 10_000`
    /// - `max_grants = 16`, `max_cleanup_callbacks = 10`
    /// - lock waits: request 5s, release 1s, quiet request 1s, quiet release 100ms
    /// - `wait_timeout = 30s`, `poll_interval = 500ms`, `status_log_interval = 5s`
    /// - `cleanup_step_delay = 10ms`, `compaction_yield = 50ms`
    fn default() -> Self {
        Self {
            low_threshold: 20_000,
            critical_threshold: 10_000,
            background_margin: 10_000,
            max_grants: 16,
            max_cleanup_callbacks: 10,
            request_lock_timeout: Duration::from_secs(5),
            release_lock_timeout: Duration::from_secs(1),
            quiet_request_lock_timeout: Duration::from_secs(1),
            quiet_release_lock_timeout: Duration::from_millis(100),
            wait_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            status_log_interval: Duration::from_secs(5),
            cleanup_step_delay: Duration::from_millis(10),
            compaction_yield: Duration::from_millis(50),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_floor_applies() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.thread_stack_for(4096), 256 * 1024);
        assert_eq!(cfg.thread_stack_for(1024 * 1024), 1024 * 1024);
    }

    #[test]
    fn zero_wait_timeout_means_no_wait() {
        let cfg = ArbiterConfig {
            wait_timeout: Duration::ZERO,
            ..ArbiterConfig::default()
        };
        assert_eq!(cfg.wait_bound(), None);
        assert_eq!(
            ArbiterConfig::default().wait_bound(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let rt = RuntimeConfig {
            frame_interval: Duration::ZERO,
            ..RuntimeConfig::default()
        };
        assert_eq!(rt.frame_interval_clamped(), Duration::from_millis(1));

        let arb = ArbiterConfig {
            poll_interval: Duration::ZERO,
            ..ArbiterConfig::default()
        };
        assert_eq!(arb.poll_interval_clamped(), Duration::from_millis(1));
    }
}
