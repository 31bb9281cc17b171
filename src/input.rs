//! # Button input.
//!
//! Samples a button line and publishes one press event per release:
//!
//! ```text
//! released → pressed : remember when the press began
//! pressed → released : held <  long_press → ButtonShortPress
//!                      held >= long_press → ButtonLongPress
//! ```
//!
//! Duration is measured between the samples that saw the edges, so it is
//! accurate to one poll interval.

use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::ButtonConfig;
use crate::events::{ButtonLongPress, ButtonShortPress, EventBus};

/// A readable button line (a GPIO pin on the appliance).
pub trait ButtonLine: Send + Sync {
    /// True while the button is held down.
    fn is_pressed(&self) -> bool;
}

/// A classified press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    /// Released before the long-press threshold.
    Short(Duration),
    /// Held at least the long-press threshold.
    Long(Duration),
}

impl Press {
    /// How long the button was held.
    pub fn duration(self) -> Duration {
        match self {
            Press::Short(d) | Press::Long(d) => d,
        }
    }
}

/// Edge detector turning samples into [`Press`]es.
#[derive(Debug, Clone)]
pub struct ButtonClassifier {
    button_id: u8,
    long_press: Duration,
    poll_interval: Duration,
    pressed_at: Option<Instant>,
}

impl ButtonClassifier {
    /// Creates a classifier for `button_id`.
    pub fn new(button_id: u8, config: &ButtonConfig) -> Self {
        Self {
            button_id,
            long_press: config.long_press,
            poll_interval: config.poll_interval.max(Duration::from_millis(1)),
            pressed_at: None,
        }
    }

    /// Identifier carried by published events.
    pub fn button_id(&self) -> u8 {
        self.button_id
    }

    /// Feeds one sample taken at `now`. Returns a press on the release edge.
    pub fn sample(&mut self, pressed: bool, now: Instant) -> Option<Press> {
        match (pressed, self.pressed_at) {
            (true, None) => {
                self.pressed_at = Some(now);
                None
            }
            (false, Some(start)) => {
                self.pressed_at = None;
                let held = now.saturating_duration_since(start);
                Some(if held < self.long_press {
                    Press::Short(held)
                } else {
                    Press::Long(held)
                })
            }
            _ => None,
        }
    }

    /// Publishes `press` as the matching button event.
    pub fn publish(&self, bus: &EventBus, press: Press) {
        let button_id = self.button_id;
        match press {
            Press::Short(duration) => {
                bus.publish(&ButtonShortPress {
                    button_id,
                    duration,
                });
            }
            Press::Long(duration) => {
                bus.publish(&ButtonLongPress {
                    button_id,
                    duration,
                });
            }
        }
    }

    /// Samples `line` every poll interval and publishes presses until
    /// `token` is cancelled.
    pub async fn run(mut self, line: &dyn ButtonLine, bus: &EventBus, token: &CancellationToken) {
        log::debug!("[button] {} sampling every {:?}", self.button_id, self.poll_interval);
        loop {
            if let Some(press) = self.sample(line.is_pressed(), Instant::now()) {
                log::debug!("[button] {} {press:?}", self.button_id);
                self.publish(bus, press);
            }
            tokio::select! {
                _ = token.cancelled() => return,
                _ = time::sleep(self.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn release_edge_classifies_against_the_threshold() {
        let mut c = ButtonClassifier::new(1, &ButtonConfig::default());
        let t0 = Instant::now();

        assert_eq!(c.sample(false, t0), None);
        assert_eq!(c.sample(true, t0), None);
        assert_eq!(c.sample(true, t0 + ms(100)), None);
        assert_eq!(c.sample(false, t0 + ms(120)), Some(Press::Short(ms(120))));

        assert_eq!(c.sample(true, t0 + ms(200)), None);
        assert_eq!(c.sample(false, t0 + ms(500)), Some(Press::Long(ms(300))));
        assert_eq!(c.sample(false, t0 + ms(600)), None);
    }

    #[test]
    fn publish_picks_the_event_type() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        bus.subscribe(move |e: &ButtonShortPress| s.lock().unwrap().push(("short", e.button_id)));
        let s = Arc::clone(&seen);
        bus.subscribe(move |e: &ButtonLongPress| s.lock().unwrap().push(("long", e.button_id)));

        let c = ButtonClassifier::new(7, &ButtonConfig::default());
        c.publish(&bus, Press::Long(ms(400)));
        c.publish(&bus, Press::Short(ms(40)));
        assert_eq!(*seen.lock().unwrap(), vec![("long", 7), ("short", 7)]);
    }

    struct Line(AtomicBool);

    impl ButtonLine for Line {
        fn is_pressed(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sampling_loop_publishes_long_then_short() {
        let bus = Arc::new(EventBus::new());
        let presses = Arc::new(Mutex::new(Vec::new()));
        let p = Arc::clone(&presses);
        bus.subscribe(move |e: &ButtonShortPress| {
            p.lock().unwrap().push(Press::Short(e.duration));
        });
        let p = Arc::clone(&presses);
        bus.subscribe(move |e: &ButtonLongPress| {
            p.lock().unwrap().push(Press::Long(e.duration));
        });

        let line = Arc::new(Line(AtomicBool::new(false)));
        let token = CancellationToken::new();
        let handle = {
            let (line, bus, token) = (Arc::clone(&line), Arc::clone(&bus), token.clone());
            let classifier = ButtonClassifier::new(1, &ButtonConfig::default());
            tokio::spawn(async move { classifier.run(&*line, &bus, &token).await })
        };

        // Samples fall on multiples of 50ms; edges change between them.
        time::sleep(ms(10)).await;
        line.0.store(true, Ordering::SeqCst);
        time::sleep(ms(500)).await;
        line.0.store(false, Ordering::SeqCst);
        time::sleep(ms(100)).await;
        line.0.store(true, Ordering::SeqCst);
        time::sleep(ms(100)).await;
        line.0.store(false, Ordering::SeqCst);
        time::sleep(ms(100)).await;

        token.cancel();
        handle.await.unwrap();
        assert_eq!(
            *presses.lock().unwrap(),
            vec![Press::Long(ms(500)), Press::Short(ms(100))]
        );
    }
}
