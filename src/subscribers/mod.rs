//! # Built-in bus consumers.
//!
//! ```text
//! Producers ── publish(&T) ──► EventBus ──► Terminal   (status log read by the renderer)
//!                                      ├──► Buzzer     (clicks and alarm tones)
//!                                      └──► LogWriter  (one log line per event)
//! ```
//!
//! Custom consumers subscribe closures directly with
//! [`EventBus::subscribe`](crate::EventBus::subscribe).

mod buzzer;
mod log_writer;
mod terminal;

pub use buzzer::{Beep, Buzzer, Sound, Tone};
pub use log_writer::LogWriter;
pub use terminal::{ConsoleLine, Terminal};
