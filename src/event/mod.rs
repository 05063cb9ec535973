//! Event handling for the dashboard.
//!
//! Terminal input, a UI tick and finished poll cycles are merged into one
//! [`Event`] stream so the UI task is the only writer of application state.

pub mod handler;

pub use handler::EventHandler;

use std::time::Duration;

use crossterm::event::KeyEvent;

use crate::monitor::CycleReport;

/// Default UI tick interval.
pub const DEFAULT_TICK_RATE: Duration = Duration::from_millis(250);

/// Application events
#[derive(Debug)]
pub enum Event {
    /// Keyboard input event
    Key(KeyEvent),
    /// Terminal resize event
    Resize(u16, u16),
    /// Regular tick, used to pick up newly opened viewers
    Tick,
    /// A poll cycle finished
    Cycle(Box<CycleReport>),
}
