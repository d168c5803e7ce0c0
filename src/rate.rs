/*
 *  rate.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Load-driven frame rates and collaborator poll backoff
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

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::info;

use crate::constants::{BACKOFF_MAX_DOUBLINGS, MIN_FPS_FLOOR};

/// Current animation and scroll rates, read by the loops each frame.
#[derive(Debug)]
pub struct FrameRates {
    animation: AtomicU32,
    scroll: AtomicU32,
}

impl FrameRates {
    pub fn animation_fps(&self) -> u32 {
        self.animation.load(Ordering::Relaxed)
    }

    pub fn scroll_fps(&self) -> u32 {
        self.scroll.load(Ordering::Relaxed)
    }
}

/// Halves both rates while the box is busy and restores them once it calms down.
pub struct RateController {
    default_animation: u32,
    default_scroll: u32,
    floor: u32,
    threshold: f64,
    throttled: bool,
    rates: Arc<FrameRates>,
}

impl RateController {
    pub fn new(animation_fps: u32, scroll_fps: u32, min_fps: u32, threshold: f64) -> Self {
        let default_animation = animation_fps.max(1);
        let default_scroll = scroll_fps.max(1);
        Self {
            default_animation,
            default_scroll,
            floor: min_fps.max(MIN_FPS_FLOOR),
            threshold,
            throttled: false,
            rates: Arc::new(FrameRates {
                animation: AtomicU32::new(default_animation),
                scroll: AtomicU32::new(default_scroll),
            }),
        }
    }

    pub fn rates(&self) -> Arc<FrameRates> {
        self.rates.clone()
    }

    pub fn is_throttled(&self) -> bool {
        self.throttled
    }

    fn reduced(&self, default: u32) -> u32 {
        (default / 2).max(self.floor).min(default)
    }

    /// Feed one load-per-core sample. Returns true when the rates changed.
    pub fn apply_load(&mut self, load_per_core: f64) -> bool {
        let busy = load_per_core > self.threshold;
        if busy == self.throttled {
            return false;
        }
        self.throttled = busy;
        let (anim, scroll) = if busy {
            (self.reduced(self.default_animation), self.reduced(self.default_scroll))
        } else {
            (self.default_animation, self.default_scroll)
        };
        self.rates.animation.store(anim, Ordering::Relaxed);
        self.rates.scroll.store(scroll, Ordering::Relaxed);
        info!(
            "Load {:.2}/core: animation {} fps, scroll {} fps{}",
            load_per_core,
            anim,
            scroll,
            if busy { " (throttled)" } else { "" }
        );
        true
    }
}

/// Poll interval policy for a rate-limited collaborator.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    base: Duration,
    cap: Duration,
    idle: Duration,
    idle_after: u32,
    errors: u32,
    idle_count: u32,
}

impl PollBackoff {
    pub fn new(base: Duration, cap: Duration, idle: Duration, idle_after: u32) -> Self {
        Self { base, cap, idle, idle_after, errors: 0, idle_count: 0 }
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn record_error(&mut self) {
        self.errors = self.errors.saturating_add(1);
    }

    /// A successful poll; `playing` is false when nothing is playing.
    pub fn record_result(&mut self, playing: bool) {
        self.errors = 0;
        if playing {
            self.idle_count = 0;
        } else {
            self.idle_count = self.idle_count.saturating_add(1);
        }
    }

    pub fn interval(&self) -> Duration {
        if self.errors > 0 {
            let doublings = (self.errors - 1).min(BACKOFF_MAX_DOUBLINGS);
            return (self.base * 2u32.pow(doublings)).min(self.cap);
        }
        if self.idle_after > 0 && self.idle_count >= self.idle_after {
            self.idle
        } else {
            self.base
        }
    }
}
