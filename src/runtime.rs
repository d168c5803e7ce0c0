/*
 *  runtime.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  The long-running loops: animation and scroll, collaborator polling
 *  and console input
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

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::animation::AnimationEngine;
use crate::display::state::DisplayState;
use crate::display::FrameTarget;
use crate::ingest::Ingest;
use crate::input::InputEvent;
use crate::media::{MediaSource, WeatherSource};
use crate::metrics::LoadSampler;
use crate::pacer::Pacer;
use crate::rate::{PollBackoff, RateController};
use crate::shutdown::Shutdown;

/// Upper bound on any sleep inside the animation loop.
const ANIMATION_MAX_NAP: Duration = Duration::from_millis(50);

/// Sprite motion and ticker advance, paced by the rate controller.
pub struct AnimationLoop {
    pub state: Arc<DisplayState>,
    pub engine: AnimationEngine,
    pub controller: RateController,
    pub sampler: LoadSampler,
    pub sample_every: Duration,
}

impl AnimationLoop {
    /// Advance sprites one frame if the now playing screen is live.
    pub fn animate(state: &DisplayState, engine: &mut AnimationEngine, now: Instant) -> bool {
        let mut f = state.lock();
        if f.sleep.sleeping || f.screen != FrameTarget::NowPlaying || !f.settings.animation {
            engine.reset_clock();
            return false;
        }
        let dt = engine.frame_dt(now);
        engine.step(&mut f.sprites, dt)
    }

    pub fn scroll(state: &DisplayState) -> bool {
        let mut f = state.lock();
        if f.sleep.sleeping || f.screen != FrameTarget::NowPlaying || !f.settings.scrolling {
            return false;
        }
        f.scroll.tick_all();
        f.scroll.any_active()
    }

    fn sample_load(&mut self) {
        match self.sampler.sample() {
            Ok(sample) => {
                self.controller.apply_load(sample.per_core());
            }
            Err(e) => debug!("load sample failed: {}", e),
        }
    }

    pub fn run(mut self, shutdown: Shutdown) {
        let rates = self.controller.rates();
        let mut anim = Pacer::new(rates.animation_fps());
        let mut scroll = Pacer::new(rates.scroll_fps());
        let mut next_sample = Instant::now();
        info!(
            "Animation loop started ({} fps, scroll {} fps, {} cores)",
            anim.fps(),
            scroll.fps(),
            self.sampler.cores()
        );
        while !shutdown.is_triggered() {
            let now = Instant::now();
            if now >= next_sample {
                self.sample_load();
                anim.set_fps(rates.animation_fps());
                scroll.set_fps(rates.scroll_fps());
                next_sample = now + self.sample_every;
            }
            if anim.ready_at(now) {
                Self::animate(&self.state, &mut self.engine, now);
            }
            if scroll.ready_at(now) {
                Self::scroll(&self.state);
            }
            let nap = anim.until_next().min(scroll.until_next()).min(ANIMATION_MAX_NAP);
            thread::sleep(nap.max(Duration::from_millis(1)));
        }
        info!("Animation loop stopped");
    }

    pub fn spawn(self, shutdown: Shutdown) -> io::Result<JoinHandle<()>> {
        thread::Builder::new().name("animation".into()).spawn(move || self.run(shutdown))
    }
}

/// Poll the media collaborator with backoff. Errors keep the stale state.
pub fn spawn_media_poller<M: MediaSource + 'static>(
    mut source: M,
    ingest: Ingest,
    mut backoff: PollBackoff,
    shutdown: Shutdown,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("media-poller".into()).spawn(move || {
        info!("Media poller started");
        while !shutdown.is_triggered() {
            match source.poll() {
                Ok(update) => {
                    backoff.record_result(update.as_ref().is_some_and(|u| u.track.is_playing));
                    ingest.on_track(update, Instant::now());
                }
                Err(e) => {
                    backoff.record_error();
                    warn!("Media poll failed ({} in a row): {}", backoff.errors(), e);
                }
            }
            if shutdown.sleep(backoff.interval()) {
                break;
            }
        }
        info!("Media poller stopped");
    })
}

pub fn spawn_weather_poller<W: WeatherSource + 'static>(
    mut source: W,
    ingest: Ingest,
    mut backoff: PollBackoff,
    shutdown: Shutdown,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("weather-poller".into()).spawn(move || {
        info!("Weather poller started");
        while !shutdown.is_triggered() {
            match source.poll() {
                Ok(update) => {
                    backoff.record_result(true);
                    ingest.on_weather(update);
                }
                Err(e) => {
                    backoff.record_error();
                    warn!("Weather poll failed ({} in a row): {}", backoff.errors(), e);
                }
            }
            if shutdown.sleep(backoff.interval()) {
                break;
            }
        }
        info!("Weather poller stopped");
    })
}

/// Console controls. The reader blocks on stdin, so it is never joined.
pub fn spawn_input_reader(ingest: Ingest, shutdown: Shutdown) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("input".into()).spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            if shutdown.is_triggered() {
                break;
            }
            let Ok(line) = line else { break };
            match InputEvent::from_key(&line) {
                Some(event) => {
                    ingest.on_input(event, Instant::now());
                }
                None => debug!("unmapped key {:?}", line.trim()),
            }
        }
        debug!("input reader finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ImageCaches;
    use crate::display::Layout;
    use crate::ingest::IngestOptions;
    use crate::media::{SourceError, TrackState, TrackUpdate};
    use crate::pipeline::Coordinator;
    use chrono::Utc;
    use parking_lot::Mutex;

    /// Fails the first `failures` polls, then reports nothing playing.
    struct RateLimited {
        failures: usize,
        attempts: Arc<Mutex<Vec<Instant>>>,
    }

    impl MediaSource for RateLimited {
        fn poll(&mut self) -> Result<Option<TrackUpdate>, SourceError> {
            let mut attempts = self.attempts.lock();
            attempts.push(Instant::now());
            if attempts.len() <= self.failures {
                Err(SourceError::Io(io::Error::other("429 too many requests")))
            } else {
                Ok(None)
            }
        }
    }

    fn playing_state() -> Arc<DisplayState> {
        let state = Arc::new(DisplayState::new((128, 64), FrameTarget::NowPlaying, (32, 32), (16, 16)));
        {
            let mut f = state.lock();
            f.track = Some(TrackState {
                title: "a title much too long for a small panel to show".into(),
                artists: vec![],
                album: String::new(),
                position_secs: 0.0,
                duration_secs: 0.0,
                is_playing: true,
                timestamp: Utc::now(),
            });
            let layout = crate::display::Layout::for_size(128, 64);
            let track = f.track.clone().unwrap();
            layout.fit_scroll(&mut f.scroll, &track);
        }
        state
    }

    #[test]
    fn test_animation_moves_sprites_on_now_playing() {
        let state = playing_state();
        let mut engine = AnimationEngine::with_seed(1.0, 3);
        let t0 = Instant::now();
        let before = state.snapshot().sprites.album.position;
        AnimationLoop::animate(&state, &mut engine, t0);
        AnimationLoop::animate(&state, &mut engine, t0 + Duration::from_millis(100));
        assert_ne!(state.snapshot().sprites.album.position, before);
    }

    #[test]
    fn test_animation_paused_when_disabled_or_elsewhere() {
        let state = playing_state();
        let mut engine = AnimationEngine::with_seed(1.0, 3);
        let t0 = Instant::now();
        state.lock().settings.animation = false;
        let before = state.snapshot().sprites;
        assert!(!AnimationLoop::animate(&state, &mut engine, t0));
        assert!(!AnimationLoop::animate(&state, &mut engine, t0 + Duration::from_millis(100)));
        assert_eq!(state.snapshot().sprites, before);

        state.lock().settings.animation = true;
        state.set_screen(FrameTarget::Clock);
        assert!(!AnimationLoop::animate(&state, &mut engine, t0 + Duration::from_millis(200)));
    }

    #[test]
    fn test_scroll_ticks_only_when_enabled() {
        let state = playing_state();
        assert!(AnimationLoop::scroll(&state));
        assert_eq!(state.snapshot().scroll.title.offset, 2);
        state.lock().settings.scrolling = false;
        assert!(!AnimationLoop::scroll(&state));
        assert_eq!(state.snapshot().scroll.title.offset, 2);
    }

    #[test]
    fn test_media_poller_backs_off_after_errors() {
        let base = Duration::from_millis(30);
        let cap = Duration::from_millis(200);
        let state = Arc::new(DisplayState::new((128, 64), FrameTarget::Clock, (32, 32), (16, 16)));
        let (_coordinator, requester) = Coordinator::new(state.clone(), Arc::new(ImageCaches::new(3, 3, 3)), None, 5);
        let options = IngestOptions { album_size: (32, 32), portrait_size: (16, 16), dither: false, auto_switch: false };
        let ingest = Ingest::new(state, requester, None, Layout::for_size(128, 64), options);

        let attempts = Arc::new(Mutex::new(Vec::new()));
        let source = RateLimited { failures: 3, attempts: attempts.clone() };
        let shutdown = Shutdown::new();
        let backoff = PollBackoff::new(base, cap, base, 0);
        let handle = spawn_media_poller(source, ingest, backoff, shutdown.clone()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while attempts.lock().len() < 4 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        shutdown.trigger();
        handle.join().unwrap();

        let at = attempts.lock().clone();
        assert!(at.len() >= 4, "only {} polls", at.len());
        assert!(at[1] - at[0] >= base);
        assert!(at[2] - at[1] >= base * 2);
        let fourth = at[3] - at[2];
        assert!(fourth >= base * 4, "{fourth:?}");
        assert!(fourth <= cap, "{fourth:?}");
    }
}
