//! # Buzzer: audible feedback for input and alarms.
//!
//! ```text
//! ButtonShortPress ──► Sound::Click     1 × 50ms  @ 1000 Hz
//! CriticalAlarm    ──► Sound::AlarmOn   3 × 100ms @ 800 Hz
//! CriticalAlarmOff ──► Sound::AlarmOff  1 × 500ms @ 200 Hz
//! ```
//!
//! Bus handlers only queue a sound. [`Buzzer::run`] plays it on its own task,
//! one beep per tick, so a publisher never waits for audio. A sound queued
//! while another one is playing replaces the rest of the old one.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::BuzzerConfig;
use crate::events::{ButtonShortPress, CriticalAlarm, CriticalAlarmOff, EventBus, SubscriptionId};

/// Output stage driving the speaker.
pub trait Tone: Send + Sync {
    /// Starts a square wave at `frequency_hz` with the given duty level.
    fn start(&self, frequency_hz: u32, volume: u8);
    /// Silences the output.
    fn stop(&self);
}

/// One tone of a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beep {
    /// How long the tone sounds.
    pub duration: Duration,
    /// Tone pitch.
    pub frequency_hz: u32,
}

impl Beep {
    const fn new(millis: u64, frequency_hz: u32) -> Self {
        Self {
            duration: Duration::from_millis(millis),
            frequency_hz,
        }
    }
}

const CLICK: [Beep; 1] = [Beep::new(50, 1000)];
const ALARM_ON: [Beep; 3] = [Beep::new(100, 800); 3];
const ALARM_OFF: [Beep; 1] = [Beep::new(500, 200)];

/// Sounds the buzzer knows how to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sound {
    /// Short key click.
    Click,
    /// Alarm raised.
    AlarmOn,
    /// Alarm cleared.
    AlarmOff,
}

impl Sound {
    /// Beeps making up this sound, in play order.
    pub fn beeps(self) -> &'static [Beep] {
        match self {
            Sound::Click => &CLICK,
            Sound::AlarmOn => &ALARM_ON,
            Sound::AlarmOff => &ALARM_OFF,
        }
    }
}

/// Sound player fed by the event bus.
///
/// Dropping the buzzer removes its subscriptions.
pub struct Buzzer {
    bus: Arc<EventBus>,
    subscriptions: Vec<SubscriptionId>,
    queued: Arc<Mutex<Option<Sound>>>,
    sink: Arc<dyn Tone>,
    config: BuzzerConfig,
}

impl Buzzer {
    /// Creates a buzzer playing through `sink` and subscribes it to
    /// [`ButtonShortPress`], [`CriticalAlarm`] and [`CriticalAlarmOff`].
    pub fn attach(bus: &Arc<EventBus>, sink: Arc<dyn Tone>, config: BuzzerConfig) -> Self {
        let queued = Arc::new(Mutex::new(None));

        let q = Arc::clone(&queued);
        let click = bus.subscribe(move |_: &ButtonShortPress| set(&q, Sound::Click));
        let q = Arc::clone(&queued);
        let alarm_on = bus.subscribe(move |e: &CriticalAlarm| {
            log::debug!("[buzzer] alarm on (severity {})", e.severity);
            set(&q, Sound::AlarmOn)
        });
        let q = Arc::clone(&queued);
        let alarm_off = bus.subscribe(move |e: &CriticalAlarmOff| {
            log::debug!("[buzzer] alarm off: {}", e.reason);
            set(&q, Sound::AlarmOff)
        });

        Self {
            bus: Arc::clone(bus),
            subscriptions: vec![click, alarm_on, alarm_off],
            queued,
            sink,
            config,
        }
    }

    /// Queues `sound`, replacing anything not yet started.
    pub fn queue(&self, sound: Sound) {
        set(&self.queued, sound);
    }

    /// Sound waiting for the next tick, if any.
    pub fn queued(&self) -> Option<Sound> {
        *self.queued.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Plays queued sounds until `token` is cancelled. The output is silenced
    /// on exit.
    pub async fn run(&self, token: &CancellationToken) {
        let tick = self.config.tick.max(Duration::from_millis(1));
        let mut playing: Option<(Sound, usize)> = None;

        loop {
            let next = self.queued.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(sound) = next {
                playing = Some((sound, 0));
            }

            if let Some((sound, step)) = playing {
                let beeps = sound.beeps();
                if let Some(beep) = beeps.get(step) {
                    self.beep(*beep, token).await;
                }
                playing = (step + 1 < beeps.len()).then_some((sound, step + 1));
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = time::sleep(tick) => {}
            }
        }
        self.sink.stop();
    }

    async fn beep(&self, beep: Beep, token: &CancellationToken) {
        log::trace!("[buzzer] {}Hz for {:?}", beep.frequency_hz, beep.duration);
        self.sink.start(beep.frequency_hz, self.config.volume);
        tokio::select! {
            _ = token.cancelled() => {}
            _ = time::sleep(beep.duration) => {}
        }
        self.sink.stop();
    }
}

impl Drop for Buzzer {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

impl std::fmt::Debug for Buzzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buzzer")
            .field("queued", &self.queued())
            .field("volume", &self.config.volume)
            .finish()
    }
}

fn set(slot: &Mutex<Option<Sound>>, sound: Sound) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(sound);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ButtonLongPress;
    use tokio::time::Instant;

    /// Records `(offset, frequency)` for starts and `(offset, 0)` for stops.
    struct RecordingTone {
        origin: Instant,
        calls: Mutex<Vec<(Duration, u32)>>,
    }

    impl RecordingTone {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                origin: Instant::now(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn starts(&self) -> Vec<(u64, u32)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, hz)| *hz != 0)
                .map(|(at, hz)| (at.as_millis() as u64, *hz))
                .collect()
        }

        fn stops(&self) -> usize {
            self.calls.lock().unwrap().iter().filter(|(_, hz)| *hz == 0).count()
        }
    }

    impl Tone for RecordingTone {
        fn start(&self, frequency_hz: u32, volume: u8) {
            assert_eq!(volume, 200);
            self.calls.lock().unwrap().push((self.origin.elapsed(), frequency_hz));
        }

        fn stop(&self) {
            self.calls.lock().unwrap().push((self.origin.elapsed(), 0));
        }
    }

    fn spawn(buzzer: &Arc<Buzzer>, token: &CancellationToken) -> tokio::task::JoinHandle<()> {
        let (b, t) = (Arc::clone(buzzer), token.clone());
        tokio::spawn(async move { b.run(&t).await })
    }

    #[test]
    fn sounds_match_their_beep_patterns() {
        assert_eq!(Sound::Click.beeps(), &[Beep::new(50, 1000)]);
        assert_eq!(Sound::AlarmOn.beeps().len(), 3);
        assert!(Sound::AlarmOn.beeps().iter().all(|b| b.frequency_hz == 800));
        assert_eq!(Sound::AlarmOff.beeps()[0].duration, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn alarm_plays_three_beeps_one_per_tick() {
        let bus = Arc::new(EventBus::new());
        let tone = RecordingTone::new();
        let buzzer = Arc::new(Buzzer::attach(&bus, tone.clone(), BuzzerConfig::default()));
        bus.publish(&CriticalAlarm {
            message: "over temperature".into(),
            severity: 3,
        });
        assert_eq!(buzzer.queued(), Some(Sound::AlarmOn));

        let token = CancellationToken::new();
        let handle = spawn(&buzzer, &token);
        time::sleep(Duration::from_millis(1_000)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(tone.starts(), vec![(0, 800), (300, 800), (600, 800)]);
        // one stop per beep plus the final silence
        assert_eq!(tone.stops(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_sound_replaces_the_rest_of_the_current_one() {
        let bus = Arc::new(EventBus::new());
        let tone = RecordingTone::new();
        let buzzer = Arc::new(Buzzer::attach(&bus, tone.clone(), BuzzerConfig::default()));
        bus.publish(&CriticalAlarm {
            message: "door open".into(),
            severity: 1,
        });

        let token = CancellationToken::new();
        let handle = spawn(&buzzer, &token);
        time::sleep(Duration::from_millis(350)).await;
        bus.publish(&CriticalAlarmOff {
            reason: "door closed".into(),
        });
        time::sleep(Duration::from_millis(1_000)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(tone.starts(), vec![(0, 800), (300, 800), (600, 200)]);
    }

    #[tokio::test(start_paused = true)]
    async fn short_press_clicks_and_long_press_is_silent() {
        let bus = Arc::new(EventBus::new());
        let tone = RecordingTone::new();
        let buzzer = Arc::new(Buzzer::attach(&bus, tone.clone(), BuzzerConfig::default()));
        bus.publish(&ButtonLongPress {
            button_id: 1,
            duration: Duration::from_millis(900),
        });
        assert_eq!(buzzer.queued(), None);

        bus.publish(&ButtonShortPress {
            button_id: 1,
            duration: Duration::from_millis(80),
        });
        let token = CancellationToken::new();
        let handle = spawn(&buzzer, &token);
        time::sleep(Duration::from_millis(500)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(tone.starts(), vec![(0, 1000)]);
    }

    #[tokio::test]
    async fn dropping_the_buzzer_unsubscribes() {
        let bus = Arc::new(EventBus::new());
        let buzzer = Buzzer::attach(&bus, RecordingTone::new(), BuzzerConfig::default());
        assert_eq!(bus.subscriber_count::<CriticalAlarm>(), 1);
        drop(buzzer);
        assert_eq!(bus.subscriber_count::<CriticalAlarm>(), 0);
        assert_eq!(bus.subscriber_count::<ButtonShortPress>(), 0);
        let off = CriticalAlarmOff {
            reason: "cleared".into(),
        };
        assert_eq!(bus.publish(&off), 0);
    }
}
