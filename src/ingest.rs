/*
 *  ingest.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Applies collaborator updates and input to the display state and
 *  queues the image work they imply
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
use std::time::Instant;

use log::{debug, info};
use parking_lot::Mutex;

use crate::bitmap::ContentHash;
use crate::cache::Variant;
use crate::constants::ACCENT_SAMPLE_SIZE;
use crate::display::compose::Layout;
use crate::display::state::{DisplayState, Slot};
use crate::display::FrameTarget;
use crate::input::{InputDebouncer, InputEvent, Setting};
use crate::media::{TrackUpdate, WeatherUpdate};
use crate::persist::WriterHandle;
use crate::pipeline::{AccentColors, BackgroundRequester, JobInput};

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub album_size: (u32, u32),
    pub portrait_size: (u32, u32),
    /// Produce 1-bit album art as well
    pub dither: bool,
    /// Jump to the now playing screen when playback starts
    pub auto_switch: bool,
}

/// Shared by the pollers and the input reader; every method takes `&self`.
#[derive(Clone)]
pub struct Ingest {
    state: Arc<DisplayState>,
    requester: BackgroundRequester,
    writer: Option<WriterHandle>,
    layout: Layout,
    options: IngestOptions,
    debouncer: Arc<Mutex<InputDebouncer>>,
}

fn input_for(bytes: Option<Arc<[u8]>>) -> JobInput {
    bytes.map(JobInput::Encoded).unwrap_or(JobInput::Empty)
}

impl Ingest {
    pub fn new(
        state: Arc<DisplayState>,
        requester: BackgroundRequester,
        writer: Option<WriterHandle>,
        layout: Layout,
        options: IngestOptions,
    ) -> Self {
        Self {
            state,
            requester,
            writer,
            layout,
            options,
            debouncer: Arc::new(Mutex::new(InputDebouncer::default())),
        }
    }

    fn icon_size(&self) -> (u32, u32) {
        let side = (self.layout.height / 2).max(8);
        (side, side)
    }

    /// Media poll result. `None` means nothing is playing; the last track
    /// stays on screen, marked paused, so sleep can take over.
    pub fn on_track(&self, update: Option<TrackUpdate>, now: Instant) {
        let Some(update) = update else {
            let mut f = self.state.lock();
            if let Some(track) = f.track.as_mut() {
                if track.is_playing {
                    debug!("nothing playing");
                    track.is_playing = false;
                }
            }
            return;
        };

        let art = input_for(update.art);
        let portrait = input_for(update.portrait);
        let art_hash = art.content_hash();
        let portrait_hash = portrait.content_hash();
        let track = update.track;

        let (persist, art_changed, portrait_changed) = {
            let mut f = self.state.lock();
            let was_playing = f.is_playing();
            if f.track.as_ref().is_none_or(|old| !old.same_track(&track)) {
                info!("Now playing: {} - {}", track.artist_line(), track.title);
            }
            self.layout.fit_scroll(&mut f.scroll, &track);

            let art_changed = f.sources.art != art_hash;
            if art_changed {
                f.sources.art = art_hash;
                f.album_art = None;
                f.album_art_mono = None;
            }
            let portrait_changed = f.sources.portrait != portrait_hash;
            if portrait_changed {
                f.sources.portrait = portrait_hash;
                f.portrait = None;
            }

            if track.is_playing && !was_playing {
                f.sleep.wake(now);
                if self.options.auto_switch && f.screen != FrameTarget::NowPlaying {
                    info!("Playback started, switching to now playing");
                    f.screen = FrameTarget::NowPlaying;
                }
            }
            let persist = f.track.as_ref() != Some(&track);
            f.track = Some(track.clone());
            (persist, art_changed, portrait_changed)
        };

        // queue work with the guard released; emptied slots lose their dedup entry
        if art_changed {
            self.requester.forget(Slot::AlbumArt);
            self.requester.forget(Slot::AlbumArtMono);
        }
        if portrait_changed {
            self.requester.forget(Slot::Portrait);
        }
        let size = self.layout_size();
        self.requester.request(art.clone(), size, Variant::Background, Slot::Background);
        if art_hash == ContentHash::EMPTY {
            self.state.apply_accents(ContentHash::EMPTY, AccentColors::default());
            self.requester.forget(Slot::Accents);
        } else {
            let sample = (ACCENT_SAMPLE_SIZE, ACCENT_SAMPLE_SIZE);
            self.requester.request(art.clone(), sample, Variant::Accent, Slot::Accents);
            self.requester.request(art.clone(), self.options.album_size, Variant::Resize, Slot::AlbumArt);
            if self.options.dither {
                self.requester.request(art, self.options.album_size, Variant::Dither, Slot::AlbumArtMono);
            }
        }
        if portrait_hash != ContentHash::EMPTY {
            self.requester.request(portrait, self.options.portrait_size, Variant::Resize, Slot::Portrait);
        }

        if persist {
            if let Some(writer) = &self.writer {
                writer.enqueue(track);
            }
        }
    }

    fn layout_size(&self) -> (u32, u32) {
        (self.layout.width, self.layout.height)
    }

    /// Weather poll result. `None` shows the error panel.
    pub fn on_weather(&self, update: Option<WeatherUpdate>) {
        let Some(update) = update else {
            let mut f = self.state.lock();
            f.weather = None;
            return;
        };
        let icon = update.icon.map(|bmp| JobInput::Decoded(Arc::new(bmp))).unwrap_or(JobInput::Empty);
        let icon_hash = icon.content_hash();
        let icon_changed = {
            let mut f = self.state.lock();
            f.weather = Some(update.report);
            let changed = f.sources.weather_icon != icon_hash;
            if changed {
                f.sources.weather_icon = icon_hash;
                f.weather_icon = None;
            }
            changed
        };
        if icon_changed {
            self.requester.forget(Slot::WeatherIcon);
        }
        if icon_hash != ContentHash::EMPTY {
            self.requester.request(icon, self.icon_size(), Variant::Resize, Slot::WeatherIcon);
        }
    }

    /// Returns false when the press was debounced away.
    pub fn on_input(&self, event: InputEvent, now: Instant) -> bool {
        if !self.debouncer.lock().accept(&event, now) {
            debug!("debounced {:?}", event);
            return false;
        }
        let mut f = self.state.lock();
        if f.sleep.wake(now) {
            info!("Display woken by input");
        }
        match event {
            InputEvent::NextScreen => f.screen = f.screen.next(),
            InputEvent::Show(target) => f.screen = target,
            InputEvent::Toggle(Setting::Animation) => {
                f.settings.animation = !f.settings.animation;
                info!("Animation {}", if f.settings.animation { "on" } else { "off" });
            }
            InputEvent::Toggle(Setting::Scrolling) => {
                f.settings.scrolling = !f.settings.scrolling;
                info!("Scrolling {}", if f.settings.scrolling { "on" } else { "off" });
            }
            InputEvent::Activity => {}
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ImageCaches;
    use crate::bitmap::Bitmap;
    use crate::media::{TrackState, WeatherReport};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use crate::pipeline::Coordinator;
    use chrono::Utc;
    use std::time::Duration;

    fn setup(auto_switch: bool) -> (Arc<DisplayState>, Coordinator, Ingest) {
        let state = Arc::new(DisplayState::new((128, 64), FrameTarget::Clock, (32, 32), (16, 16)));
        let (coordinator, requester) = Coordinator::new(state.clone(), Arc::new(ImageCaches::new(3, 3, 3)), None, 5);
        let options = IngestOptions { album_size: (32, 32), portrait_size: (16, 16), dither: true, auto_switch };
        let ingest = Ingest::new(state.clone(), requester, None, Layout::for_size(128, 64), options);
        (state, coordinator, ingest)
    }

    fn track(title: &str, playing: bool) -> TrackState {
        TrackState {
            title: title.into(),
            artists: vec!["A".into()],
            album: "B".into(),
            position_secs: 0.0,
            duration_secs: 100.0,
            is_playing: playing,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_playback_start_switches_and_wakes() {
        let (state, _c, ingest) = setup(true);
        state.lock().sleep.sleeping = true;
        ingest.on_track(Some(TrackUpdate { track: track("x", true), art: None, portrait: None }), Instant::now());
        let snap = state.snapshot();
        assert_eq!(snap.screen, FrameTarget::NowPlaying);
        assert!(!snap.sleep.sleeping);
    }

    #[test]
    fn test_auto_switch_can_be_disabled() {
        let (state, _c, ingest) = setup(false);
        ingest.on_track(Some(TrackUpdate { track: track("x", true), art: None, portrait: None }), Instant::now());
        assert_eq!(state.screen(), FrameTarget::Clock);
    }

    #[test]
    fn test_no_art_produces_background_only() {
        let (state, mut c, ingest) = setup(false);
        ingest.on_track(Some(TrackUpdate { track: track("x", true), art: None, portrait: None }), Instant::now());
        for _ in 0..10 {
            c.step(Duration::from_millis(10));
        }
        let snap = state.snapshot();
        assert!(snap.background.is_some());
        assert!(snap.album_art.is_none());
        assert_eq!(c.stats().dispatched, 1);
    }

    #[test]
    fn test_nothing_playing_pauses_last_track() {
        let (state, _c, ingest) = setup(false);
        ingest.on_track(Some(TrackUpdate { track: track("x", true), art: None, portrait: None }), Instant::now());
        ingest.on_track(None, Instant::now());
        let snap = state.snapshot();
        assert_eq!(snap.track.as_ref().map(|t| t.is_playing), Some(false));
    }

    #[test]
    fn test_input_cycles_and_toggles() {
        let (state, _c, ingest) = setup(false);
        let t0 = Instant::now();
        assert!(ingest.on_input(InputEvent::NextScreen, t0));
        assert_eq!(state.screen(), FrameTarget::Weather);
        assert!(!ingest.on_input(InputEvent::NextScreen, t0 + Duration::from_millis(100)));
        assert_eq!(state.screen(), FrameTarget::Weather);
        assert!(ingest.on_input(InputEvent::Toggle(Setting::Scrolling), t0));
        assert!(!state.snapshot().settings.scrolling);
        assert!(ingest.on_input(InputEvent::Show(FrameTarget::Clock), t0));
        assert_eq!(state.screen(), FrameTarget::Clock);
    }

    fn png(color: [u8; 3]) -> Arc<[u8]> {
        let img = RgbImage::from_pixel(24, 24, Rgb(color));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        Arc::from(out.into_inner())
    }

    fn drain(c: &mut Coordinator) {
        for _ in 0..30 {
            c.step(Duration::from_millis(10));
        }
    }

    fn rain() -> WeatherReport {
        WeatherReport {
            condition_code: 500,
            description: "rain".into(),
            temperature_c: 12.0,
            feels_like_c: None,
            humidity_pct: Some(90),
        }
    }

    #[test]
    fn test_art_returning_after_artless_track_refills_slots() {
        let (state, mut c, ingest) = setup(false);
        let art = png([200, 20, 20]);
        let portrait = png([20, 20, 200]);
        let with_art = |title: &str| TrackUpdate {
            track: track(title, true),
            art: Some(art.clone()),
            portrait: Some(portrait.clone()),
        };

        ingest.on_track(Some(with_art("one")), Instant::now());
        drain(&mut c);
        let snap = state.snapshot();
        assert!(snap.album_art.is_some() && snap.album_art_mono.is_some() && snap.portrait.is_some());

        ingest.on_track(Some(TrackUpdate { track: track("two", true), art: None, portrait: None }), Instant::now());
        drain(&mut c);
        let snap = state.snapshot();
        assert!(snap.album_art.is_none() && snap.album_art_mono.is_none() && snap.portrait.is_none());

        ingest.on_track(Some(with_art("three")), Instant::now());
        drain(&mut c);
        let snap = state.snapshot();
        assert!(snap.album_art.is_some(), "album art did not come back");
        assert!(snap.album_art_mono.is_some(), "mono art did not come back");
        assert!(snap.portrait.is_some(), "portrait did not come back");
    }

    #[test]
    fn test_weather_icon_returns_after_gap() {
        let (state, mut c, ingest) = setup(false);
        let icon = || Some(Bitmap::solid(20, 20, [240, 200, 0]));
        ingest.on_weather(Some(WeatherUpdate { report: rain(), icon: icon() }));
        drain(&mut c);
        assert!(state.snapshot().weather_icon.is_some());

        ingest.on_weather(Some(WeatherUpdate { report: rain(), icon: None }));
        assert!(state.snapshot().weather_icon.is_none());

        ingest.on_weather(Some(WeatherUpdate { report: rain(), icon: icon() }));
        drain(&mut c);
        assert!(state.snapshot().weather_icon.is_some());
    }

    #[test]
    fn test_weather_none_clears_report() {
        let (state, _c, ingest) = setup(false);
        let report = rain();
        ingest.on_weather(Some(WeatherUpdate { report, icon: None }));
        assert!(state.snapshot().weather.is_some());
        ingest.on_weather(None);
        assert!(state.snapshot().weather.is_none());
    }
}
