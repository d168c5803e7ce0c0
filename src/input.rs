// input.rs
//! Button / touch events and per-control debouncing.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::constants::INPUT_DEBOUNCE_MS;
use crate::display::FrameTarget;

/// User toggleable render settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    /// Bouncing art sprites
    Animation,
    /// Ticker for overflowing text
    Scrolling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Cycle Weather -> NowPlaying -> Clock
    NextScreen,
    Show(FrameTarget),
    Toggle(Setting),
    /// Any touch or press that should keep the screen awake
    Activity,
}

/// Physical control an event came from; debounce is tracked per control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Next,
    Screen(FrameTarget),
    Toggle(Setting),
    Touch,
}

impl InputEvent {
    pub fn control(&self) -> Control {
        match *self {
            InputEvent::NextScreen => Control::Next,
            InputEvent::Show(target) => Control::Screen(target),
            InputEvent::Toggle(setting) => Control::Toggle(setting),
            InputEvent::Activity => Control::Touch,
        }
    }

    /// Key mapping used by the console reader.
    pub fn from_key(line: &str) -> Option<Self> {
        match line.trim() {
            "" => Some(InputEvent::Activity),
            "n" => Some(InputEvent::NextScreen),
            "w" => Some(InputEvent::Show(FrameTarget::Weather)),
            "p" => Some(InputEvent::Show(FrameTarget::NowPlaying)),
            "c" => Some(InputEvent::Show(FrameTarget::Clock)),
            "a" => Some(InputEvent::Toggle(Setting::Animation)),
            "s" => Some(InputEvent::Toggle(Setting::Scrolling)),
            _ => None,
        }
    }
}

/// Drops presses that arrive within `min_gap` of the last accepted press of
/// the same control.
pub struct InputDebouncer {
    min_gap: Duration,
    last_accepted: HashMap<Control, Instant>,
}

impl Default for InputDebouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(INPUT_DEBOUNCE_MS))
    }
}

impl InputDebouncer {
    pub fn new(min_gap: Duration) -> Self {
        Self { min_gap, last_accepted: HashMap::new() }
    }

    pub fn accept(&mut self, event: &InputEvent, now: Instant) -> bool {
        let control = event.control();
        match self.last_accepted.get(&control) {
            Some(last) if now.saturating_duration_since(*last) < self.min_gap => false,
            _ => {
                self.last_accepted.insert(control, now);
                true
            }
        }
    }
}
