/*
 *  pacer.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Deadline pacing for the animation and scroll loops
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
use std::time::{Duration, Instant};

pub struct Pacer {
    next_deadline: Instant,
    frame: Duration,
    fps: u32,
}

fn frame_for(fps: u32) -> Duration {
    Duration::from_micros((1_000_000u32 / fps.max(1)) as u64)
}

impl Pacer {
    pub fn new(target_fps: u32) -> Self {
        Self { next_deadline: Instant::now(), frame: frame_for(target_fps), fps: target_fps.max(1) }
    }

    #[inline]
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Change rate; the current deadline stands.
    #[inline]
    pub fn set_fps(&mut self, fps: u32) {
        self.fps = fps.max(1);
        self.frame = frame_for(fps);
    }

    /// Returns true if a frame is due at `now`; if so, schedules the next deadline.
    #[inline]
    pub fn ready_at(&mut self, now: Instant) -> bool {
        if now >= self.next_deadline {
            self.next_deadline = now + self.frame;
            true
        } else {
            false
        }
    }

    /// Time left until the next frame is due.
    pub fn until_next(&self) -> Duration {
        self.next_deadline.saturating_duration_since(Instant::now())
    }
}
