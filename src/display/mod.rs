/*
 *  display/mod.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - shared state, composition, scheduling and sinks
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use serde::{Deserialize, Serialize};

// Core trait definitions
pub mod traits;
pub mod error;
pub mod framebuffer;

// Sinks
pub mod drivers;

// Shared display state
pub mod state;

// Frame composition
pub mod canvas;
pub mod compose;

// Render loop
pub mod scheduler;

// Re-exports for convenience
pub use traits::{DisplaySink, DisplayCapabilities, ColorDepth, RefreshMode};
pub use error::DisplayError;
pub use framebuffer::PackedFrame;
pub use state::{DisplayState, DisplayFields, SleepState, Settings, Slot};
pub use compose::Layout;
pub use scheduler::{RenderScheduler, TickOutcome};

/// Which screen the scheduler renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameTarget {
    Weather,    // current conditions
    NowPlaying, // art, ticker and progress
    Clock,      // time and date
}

impl FrameTarget {
    pub const ALL: [FrameTarget; 3] = [FrameTarget::Weather, FrameTarget::NowPlaying, FrameTarget::Clock];

    /// Next screen in button order
    pub fn next(self) -> Self {
        match self {
            FrameTarget::Weather => FrameTarget::NowPlaying,
            FrameTarget::NowPlaying => FrameTarget::Clock,
            FrameTarget::Clock => FrameTarget::Weather,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_cycles_all_screens() {
        let mut t = FrameTarget::Weather;
        for _ in 0..3 {
            t = t.next();
        }
        assert_eq!(t, FrameTarget::Weather);
        assert_eq!(FrameTarget::Clock.next(), FrameTarget::Weather);
    }

    #[test]
    fn test_serde_names() {
        let t: FrameTarget = serde_yaml::from_str("now_playing").unwrap();
        assert_eq!(t, FrameTarget::NowPlaying);
    }
}
