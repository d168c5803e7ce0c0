/*
 *  display/scheduler.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Render loop - per-screen cadence, sleep handling and frame dedup
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

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::bitmap::ContentHash;
use crate::display::FrameTarget;
use crate::display::compose::{Composer, Layout};
use crate::display::error::DisplayError;
use crate::display::framebuffer::{self, PackedFrame};
use crate::display::state::DisplayState;
use crate::display::traits::{ColorDepth, DisplaySink, RefreshMode};
use crate::shutdown::Shutdown;

/// What one scheduler tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Screen asleep; nothing drawn
    Slept,
    /// Active screen's interval has not elapsed
    NotDue,
    /// Composed, but identical to what the sink already shows
    Unchanged,
    /// New frame written
    Emitted(RefreshMode),
}

/// Timing knobs for the render loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub intervals: HashMap<FrameTarget, Duration>,
    pub tick: Duration,
    pub sleep_timeout: Duration,
    pub rotate_deg: u16,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let intervals = HashMap::from([
            (FrameTarget::Weather, Duration::from_secs(30)),
            (FrameTarget::NowPlaying, Duration::from_millis(500)),
            (FrameTarget::Clock, Duration::from_secs(1)),
        ]);
        Self {
            intervals,
            tick: Duration::from_millis(50),
            sleep_timeout: Duration::from_secs(300),
            rotate_deg: 0,
        }
    }
}

pub struct RenderScheduler<S: DisplaySink> {
    sink: S,
    state: Arc<DisplayState>,
    composer: Composer,
    config: SchedulerConfig,
    last_render: HashMap<FrameTarget, Instant>,
    last_screen: Option<FrameTarget>,
    last_hash: Option<ContentHash>,
    partial_writes: u32,
    blanked: bool,
}

impl<S: DisplaySink> RenderScheduler<S> {
    pub fn new(sink: S, state: Arc<DisplayState>, config: SchedulerConfig) -> Result<Self, DisplayError> {
        framebuffer::validate_rotation(config.rotate_deg)?;
        let (w, h) = state.snapshot().size;
        Ok(Self {
            sink,
            state,
            composer: Composer::new(Layout::for_size(w, h)),
            config,
            last_render: HashMap::new(),
            last_screen: None,
            last_hash: None,
            partial_writes: 0,
            blanked: false,
        })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn interval(&self, target: FrameTarget) -> Duration {
        self.config.intervals.get(&target).copied().unwrap_or(Duration::from_secs(1))
    }

    fn refresh_mode(&mut self) -> RefreshMode {
        let Some(budget) = self.sink.capabilities().partial_refresh_budget else {
            return RefreshMode::Partial;
        };
        if self.partial_writes >= budget {
            RefreshMode::Full
        } else {
            RefreshMode::Partial
        }
    }

    fn emit(&mut self, frame: PackedFrame) -> Result<TickOutcome, DisplayError> {
        if self.last_hash == Some(frame.hash) {
            return Ok(TickOutcome::Unchanged);
        }
        let mode = self.refresh_mode();
        self.sink.write_frame(&frame.bytes, mode)?;
        self.last_hash = Some(frame.hash);
        match mode {
            RefreshMode::Full => self.partial_writes = 0,
            RefreshMode::Partial => self.partial_writes = self.partial_writes.saturating_add(1),
        }
        Ok(TickOutcome::Emitted(mode))
    }

    /// One pass of the render loop.
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome, DisplayError> {
        // short critical section: evaluate sleep, then copy what we need
        let (sleeping, screen) = {
            let mut fields = self.state.lock();
            let playing = fields.is_playing();
            let screen = fields.screen;
            if fields.sleep.evaluate(now, screen, playing, self.config.sleep_timeout) {
                info!("Display {}", if fields.sleep.sleeping { "sleeping" } else { "waking" });
            }
            (fields.sleep.sleeping, screen)
        };

        if sleeping && screen == FrameTarget::NowPlaying {
            if !self.blanked {
                self.sink.clear()?;
                self.blanked = true;
                // whatever comes next must be written
                self.last_hash = None;
            }
            return Ok(TickOutcome::Slept);
        }
        self.blanked = false;

        let changed = self.last_screen != Some(screen);
        let due = match self.last_render.get(&screen) {
            Some(last) => now.saturating_duration_since(*last) >= self.interval(screen),
            None => true,
        };
        if !changed && !due {
            return Ok(TickOutcome::NotDue);
        }
        self.last_render.insert(screen, now);
        self.last_screen = Some(screen);

        let fields = self.state.snapshot();
        let mono = self.sink.capabilities().color_depth == ColorDepth::Monochrome;
        let frame = self.composer.compose(&fields, mono);
        let packed = framebuffer::pack(&frame, self.sink.capabilities(), self.config.rotate_deg)?;
        self.emit(packed)
    }

    /// Tick until shutdown. Sink errors are logged and the loop carries on.
    pub fn run(mut self, shutdown: Shutdown) {
        info!("Render loop started");
        let mut emitted: u64 = 0;
        while !shutdown.is_triggered() {
            match self.tick(Instant::now()) {
                Ok(TickOutcome::Emitted(mode)) => {
                    emitted += 1;
                    debug!("frame {} written ({:?})", emitted, mode);
                }
                Ok(_) => {}
                Err(e) => error!("Render failed: {}", e),
            }
            std::thread::sleep(self.config.tick);
        }
        if let Err(e) = self.sink.clear() {
            error!("Failed to blank display on exit: {}", e);
        }
        info!("Render loop stopped after {} frames", emitted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::MockSink;
    use crate::display::traits::DisplayCapabilities;
    use crate::media::TrackState;
    use chrono::Utc;

    fn state(screen: FrameTarget) -> Arc<DisplayState> {
        Arc::new(DisplayState::new((64, 32), screen, (16, 16), (8, 8)))
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig { sleep_timeout: Duration::from_secs(60), ..SchedulerConfig::default() }
    }

    #[test]
    fn test_identical_frames_written_once() {
        let sink = MockSink::new(64, 32, ColorDepth::Rgb565);
        let probe = sink.state();
        let st = state(FrameTarget::Weather);
        let mut sched = RenderScheduler::new(sink, st, config()).unwrap();
        let t0 = Instant::now();
        assert_eq!(sched.tick(t0).unwrap(), TickOutcome::Emitted(RefreshMode::Partial));
        assert_eq!(sched.tick(t0 + Duration::from_secs(1)).unwrap(), TickOutcome::NotDue);
        assert_eq!(sched.tick(t0 + Duration::from_secs(31)).unwrap(), TickOutcome::Unchanged);
        assert_eq!(probe.lock().write_count, 1);
    }

    #[test]
    fn test_screen_change_renders_immediately() {
        let sink = MockSink::new(64, 32, ColorDepth::Rgb888);
        let st = state(FrameTarget::Weather);
        let mut sched = RenderScheduler::new(sink, st.clone(), config()).unwrap();
        let t0 = Instant::now();
        sched.tick(t0).unwrap();
        st.set_screen(FrameTarget::NowPlaying);
        assert!(matches!(sched.tick(t0 + Duration::from_millis(10)).unwrap(), TickOutcome::Emitted(_)));
    }

    #[test]
    fn test_sleep_clears_once_and_wakes() {
        let sink = MockSink::new(64, 32, ColorDepth::Monochrome);
        let probe = sink.state();
        let st = state(FrameTarget::NowPlaying);
        let t0 = st.lock().sleep.last_activity;
        let mut sched = RenderScheduler::new(sink, st.clone(), config()).unwrap();
        assert!(matches!(sched.tick(t0).unwrap(), TickOutcome::Emitted(_)));
        assert_eq!(sched.tick(t0 + Duration::from_secs(61)).unwrap(), TickOutcome::Slept);
        assert_eq!(sched.tick(t0 + Duration::from_secs(62)).unwrap(), TickOutcome::Slept);
        assert_eq!(probe.lock().clear_count, 1);

        // playback resumes
        st.lock().track = Some(TrackState {
            title: "Back".into(),
            artists: vec![],
            album: String::new(),
            position_secs: 0.0,
            duration_secs: 10.0,
            is_playing: true,
            timestamp: Utc::now(),
        });
        assert!(matches!(sched.tick(t0 + Duration::from_secs(63)).unwrap(), TickOutcome::Emitted(_)));
    }

    #[test]
    fn test_other_screens_do_not_sleep() {
        let sink = MockSink::new(64, 32, ColorDepth::Monochrome);
        let st = state(FrameTarget::Clock);
        let t0 = st.lock().sleep.last_activity;
        let mut sched = RenderScheduler::new(sink, st, config()).unwrap();
        assert_ne!(sched.tick(t0 + Duration::from_secs(600)).unwrap(), TickOutcome::Slept);
    }

    #[test]
    fn test_partial_budget_forces_full_refresh() {
        let sink = MockSink::with_capabilities(DisplayCapabilities {
            width: 64,
            height: 32,
            color_depth: ColorDepth::Monochrome,
            partial_refresh_budget: Some(2),
        });
        let probe = sink.state();
        let st = state(FrameTarget::Weather);
        let mut sched = RenderScheduler::new(sink, st.clone(), config()).unwrap();
        let mut t = Instant::now();
        let mut modes = Vec::new();
        for n in 0..4 {
            // vary the frame so each one is new
            st.lock().weather = Some(crate::media::WeatherReport {
                condition_code: 800,
                description: format!("day {n}"),
                temperature_c: n as f64 * 10.0,
                feels_like_c: None,
                humidity_pct: None,
            });
            if let TickOutcome::Emitted(mode) = sched.tick(t).unwrap() {
                modes.push(mode);
            }
            t += Duration::from_secs(31);
        }
        assert_eq!(modes, vec![RefreshMode::Partial, RefreshMode::Partial, RefreshMode::Full, RefreshMode::Partial]);
        assert_eq!(probe.lock().full_refresh_count, 1);
    }

    #[test]
    fn test_bad_rotation_rejected_up_front() {
        let sink = MockSink::new(64, 32, ColorDepth::Monochrome);
        let cfg = SchedulerConfig { rotate_deg: 45, ..config() };
        assert!(RenderScheduler::new(sink, state(FrameTarget::Clock), cfg).is_err());
    }
}
