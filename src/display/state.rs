/*
 *  display/state.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared display state - the single owner of bitmaps, sprite and scroll
 *  positions, and the sleep flag
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
use std::time::{Duration, Instant};

use log::{debug, info};
use parking_lot::{Mutex, MutexGuard};

use crate::animation::SpritePair;
use crate::bitmap::{Bitmap, ContentHash};
use crate::display::FrameTarget;
use crate::media::{TrackState, WeatherReport};
use crate::pipeline::transforms::AccentColors;
use crate::scroll::ScrollFields;

/// Screen power state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepState {
    pub sleeping: bool,
    pub last_activity: Instant,
}

impl SleepState {
    pub fn new(now: Instant) -> Self {
        Self { sleeping: false, last_activity: now }
    }

    /// Record activity; returns true if this woke the screen.
    pub fn wake(&mut self, now: Instant) -> bool {
        self.last_activity = now;
        let was = self.sleeping;
        self.sleeping = false;
        was
    }

    /// Playback counts as activity. Otherwise the now playing screen goes
    /// to sleep once idle for `timeout`. Returns true on a transition.
    pub fn evaluate(&mut self, now: Instant, screen: FrameTarget, is_playing: bool, timeout: Duration) -> bool {
        if is_playing {
            return self.wake(now);
        }
        if !self.sleeping
            && screen == FrameTarget::NowPlaying
            && now.saturating_duration_since(self.last_activity) >= timeout
        {
            self.sleeping = true;
            return true;
        }
        false
    }
}

/// Toggleable render behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub animation: bool,
    pub scrolling: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { animation: true, scrolling: true }
    }
}

/// Display state field a pipeline result is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    AlbumArt,
    AlbumArtMono,
    Portrait,
    Background,
    Accents,
    WeatherIcon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Art,
    Portrait,
    WeatherIcon,
}

impl Slot {
    fn source(self) -> Source {
        match self {
            Slot::AlbumArt | Slot::AlbumArtMono | Slot::Background | Slot::Accents => Source::Art,
            Slot::Portrait => Source::Portrait,
            Slot::WeatherIcon => Source::WeatherIcon,
        }
    }
}

/// Hash of the source material each slot family was last asked to show.
/// Results computed from anything else are stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceHashes {
    pub art: ContentHash,
    pub portrait: ContentHash,
    pub weather_icon: ContentHash,
}

impl Default for SourceHashes {
    fn default() -> Self {
        Self { art: ContentHash::EMPTY, portrait: ContentHash::EMPTY, weather_icon: ContentHash::EMPTY }
    }
}

impl SourceHashes {
    fn get(&self, source: Source) -> ContentHash {
        match source {
            Source::Art => self.art,
            Source::Portrait => self.portrait,
            Source::WeatherIcon => self.weather_icon,
        }
    }
}

/// Everything the renderer reads. Cloning is cheap: bitmaps are shared.
#[derive(Debug, Clone)]
pub struct DisplayFields {
    pub size: (u32, u32),
    pub screen: FrameTarget,
    pub track: Option<TrackState>,
    pub weather: Option<WeatherReport>,
    pub album_art: Option<Arc<Bitmap>>,
    pub album_art_mono: Option<Arc<Bitmap>>,
    pub portrait: Option<Arc<Bitmap>>,
    pub background: Option<Arc<Bitmap>>,
    pub weather_icon: Option<Arc<Bitmap>>,
    pub accents: AccentColors,
    pub sources: SourceHashes,
    pub sprites: SpritePair,
    pub scroll: ScrollFields,
    pub sleep: SleepState,
    pub settings: Settings,
}

impl DisplayFields {
    pub fn is_playing(&self) -> bool {
        self.track.as_ref().is_some_and(|t| t.is_playing)
    }

    fn slot_is_empty(&self, slot: Slot) -> bool {
        match slot {
            Slot::AlbumArt => self.album_art.is_none(),
            Slot::AlbumArtMono => self.album_art_mono.is_none(),
            Slot::Portrait => self.portrait.is_none(),
            Slot::Background => self.background.is_none(),
            Slot::WeatherIcon => self.weather_icon.is_none(),
            Slot::Accents => false,
        }
    }
}

/// Guarded owner of [`DisplayFields`]. Keep critical sections short and
/// never hold the guard across I/O or sink writes.
pub struct DisplayState {
    fields: Mutex<DisplayFields>,
}

impl DisplayState {
    pub fn new(size: (u32, u32), screen: FrameTarget, album_size: (u32, u32), portrait_size: (u32, u32)) -> Self {
        let fields = DisplayFields {
            size,
            screen,
            track: None,
            weather: None,
            album_art: None,
            album_art_mono: None,
            portrait: None,
            background: None,
            weather_icon: None,
            accents: AccentColors::default(),
            sources: SourceHashes::default(),
            sprites: SpritePair::new(size, album_size, portrait_size),
            scroll: ScrollFields::default(),
            sleep: SleepState::new(Instant::now()),
            settings: Settings::default(),
        };
        Self { fields: Mutex::new(fields) }
    }

    pub fn lock(&self) -> MutexGuard<'_, DisplayFields> {
        self.fields.lock()
    }

    /// Copy out everything a frame needs.
    pub fn snapshot(&self) -> DisplayFields {
        self.fields.lock().clone()
    }

    pub fn screen(&self) -> FrameTarget {
        self.fields.lock().screen
    }

    pub fn set_screen(&self, screen: FrameTarget) {
        let mut f = self.fields.lock();
        if f.screen != screen {
            info!("Screen changed: {:?} -> {:?}", f.screen, screen);
            f.screen = screen;
        }
    }

    /// True if a result computed from `source_hash` may still be written to `slot`.
    pub fn is_current(&self, slot: Slot, source_hash: ContentHash) -> bool {
        self.fields.lock().sources.get(slot.source()) == source_hash
    }

    pub fn slot_is_empty(&self, slot: Slot) -> bool {
        self.fields.lock().slot_is_empty(slot)
    }

    /// Store a finished bitmap unless the slot has moved on to other art.
    pub fn apply_image(&self, slot: Slot, source_hash: ContentHash, bitmap: Arc<Bitmap>) -> bool {
        let mut f = self.fields.lock();
        if f.sources.get(slot.source()) != source_hash {
            debug!("dropping stale {:?} result for {}", slot, source_hash);
            return false;
        }
        match slot {
            Slot::AlbumArt => {
                f.sprites.album.resize(bitmap.dimensions());
                f.album_art = Some(bitmap);
            }
            Slot::AlbumArtMono => f.album_art_mono = Some(bitmap),
            Slot::Portrait => {
                f.sprites.portrait.resize(bitmap.dimensions());
                f.portrait = Some(bitmap);
            }
            Slot::Background => f.background = Some(bitmap),
            Slot::WeatherIcon => f.weather_icon = Some(bitmap),
            Slot::Accents => return false,
        }
        true
    }

    pub fn apply_accents(&self, source_hash: ContentHash, accents: AccentColors) -> bool {
        let mut f = self.fields.lock();
        if f.sources.art != source_hash {
            return false;
        }
        f.accents = accents;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DisplayState {
        DisplayState::new((320, 240), FrameTarget::NowPlaying, (100, 100), (60, 60))
    }

    #[test]
    fn test_sleep_after_idle_on_now_playing_only() {
        let t0 = Instant::now();
        let timeout = Duration::from_secs(60);
        let mut s = SleepState::new(t0);
        assert!(!s.evaluate(t0 + Duration::from_secs(30), FrameTarget::NowPlaying, false, timeout));
        assert!(!s.evaluate(t0 + Duration::from_secs(90), FrameTarget::Clock, false, timeout));
        assert!(!s.sleeping);
        assert!(s.evaluate(t0 + Duration::from_secs(90), FrameTarget::NowPlaying, false, timeout));
        assert!(s.sleeping);
        // resumed playback wakes
        assert!(s.evaluate(t0 + Duration::from_secs(95), FrameTarget::NowPlaying, true, timeout));
        assert!(!s.sleeping);
    }

    #[test]
    fn test_playing_postpones_sleep() {
        let t0 = Instant::now();
        let timeout = Duration::from_secs(60);
        let mut s = SleepState::new(t0);
        s.evaluate(t0 + Duration::from_secs(100), FrameTarget::NowPlaying, true, timeout);
        assert!(!s.evaluate(t0 + Duration::from_secs(130), FrameTarget::NowPlaying, false, timeout));
        assert!(s.evaluate(t0 + Duration::from_secs(161), FrameTarget::NowPlaying, false, timeout));
    }

    #[test]
    fn test_stale_results_are_dropped() {
        let st = state();
        st.lock().sources.art = ContentHash(2);
        let bmp = Arc::new(Bitmap::solid(10, 10, [1, 2, 3]));
        assert!(!st.apply_image(Slot::AlbumArt, ContentHash(1), bmp.clone()));
        assert!(st.snapshot().album_art.is_none());
        assert!(st.apply_image(Slot::AlbumArt, ContentHash(2), bmp));
        let snap = st.snapshot();
        assert_eq!(snap.album_art.unwrap().dimensions(), (10, 10));
        assert_eq!(snap.sprites.album.size, (10, 10));
    }

    #[test]
    fn test_background_for_no_art_matches_empty_hash() {
        let st = state();
        let bmp = Arc::new(Bitmap::solid(320, 240, [0, 0, 0]));
        assert!(st.apply_image(Slot::Background, ContentHash::EMPTY, bmp));
        assert!(!st.slot_is_empty(Slot::Background));
    }
}
