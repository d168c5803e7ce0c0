/*
 *  display/compose.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Frame composition for the weather, now playing and clock screens
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

//! Composition only reads a [`DisplayFields`] snapshot. It never waits on
//! the pipeline: whatever artifact is missing is drawn as a placeholder.

use std::fmt::Write;

use arrayvec::ArrayString;
use chrono::{DateTime, Local};
use embedded_graphics::mono_font::iso_8859_1::{FONT_6X10, FONT_9X15, FONT_10X20};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};

use crate::animation::AnimatedSprite;
use crate::bitmap::Bitmap;
use crate::constants::{FALLBACK_COLOR, PLACEHOLDER_COLOR};
use crate::display::FrameTarget;
use crate::display::canvas::Canvas;
use crate::display::state::DisplayFields;
use crate::scroll::{text_width, ScrollField, ScrollFields};
use crate::media::TrackState;

/// Display size class, picked from the resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutCategory {
    /// 128x64 class OLEDs
    Small,
    /// 256x64 and similar
    Medium,
    /// 320x240 and up
    Large,
}

/// Geometry and fonts for one screen size.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub category: LayoutCategory,
    pub margin: u32,
    pub title_font: &'static MonoFont<'static>,
    pub line_font: &'static MonoFont<'static>,
    pub clock_font: &'static MonoFont<'static>,
    pub progress_height: u32,
}

impl Layout {
    pub fn for_size(width: u32, height: u32) -> Self {
        let category = match (width, height) {
            (w, h) if w >= 320 || h >= 160 => LayoutCategory::Large,
            (w, h) if w >= 256 && h >= 64 => LayoutCategory::Medium,
            _ => LayoutCategory::Small,
        };
        match category {
            LayoutCategory::Small => Self {
                width,
                height,
                category,
                margin: 1,
                title_font: &FONT_6X10,
                line_font: &FONT_6X10,
                clock_font: &FONT_10X20,
                progress_height: 2,
            },
            LayoutCategory::Medium => Self {
                width,
                height,
                category,
                margin: 2,
                title_font: &FONT_9X15,
                line_font: &FONT_6X10,
                clock_font: &FONT_10X20,
                progress_height: 3,
            },
            LayoutCategory::Large => Self {
                width,
                height,
                category,
                margin: 6,
                title_font: &FONT_10X20,
                line_font: &FONT_9X15,
                clock_font: &FONT_10X20,
                progress_height: 5,
            },
        }
    }

    fn advance(font: &MonoFont<'_>) -> u32 {
        font.character_size.width + font.character_spacing
    }

    pub fn title_char_width(&self) -> u32 {
        Self::advance(self.title_font)
    }

    pub fn line_char_width(&self) -> u32 {
        Self::advance(self.line_font)
    }

    /// Room for one line of scrolled text.
    pub fn text_area_width(&self) -> u32 {
        self.width.saturating_sub(self.margin * 2)
    }

    /// Measure the track text against this layout and update the tickers.
    /// Returns true if any field was reset by new text.
    pub fn fit_scroll(&self, scroll: &mut ScrollFields, track: &TrackState) -> bool {
        let area = self.text_area_width();
        let artists = track.artist_line();
        let a = scroll.title.set_text(&track.title, text_width(&track.title, self.title_char_width()), area);
        let b = scroll.artist.set_text(&artists, text_width(&artists, self.line_char_width()), area);
        let c = scroll.album.set_text(&track.album, text_width(&track.album, self.line_char_width()), area);
        a || b || c
    }
}

/// Stack buffers for per-frame strings.
pub struct RenderBuffers {
    /// Buffer for time strings (e.g., "3:45 / 4:10")
    pub time_buffer: ArrayString<32>,

    /// Buffer for date and weather lines
    pub line_buffer: ArrayString<64>,
}

impl Default for RenderBuffers {
    fn default() -> Self {
        Self { time_buffer: ArrayString::new(), line_buffer: ArrayString::new() }
    }
}

fn push_mm_ss(buf: &mut ArrayString<32>, seconds: f64) {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds as u32 } else { 0 };
    let _ = write!(buf, "{}:{:02}", total / 60, total % 60);
}

impl RenderBuffers {
    /// "m:ss / m:ss" without allocating
    pub fn format_progress(&mut self, position: f64, duration: f64) -> &str {
        self.time_buffer.clear();
        push_mm_ss(&mut self.time_buffer, position);
        let _ = self.time_buffer.try_push_str(" / ");
        push_mm_ss(&mut self.time_buffer, duration);
        &self.time_buffer
    }
}

fn rgb(c: [u8; 3]) -> Rgb888 {
    Rgb888::new(c[0], c[1], c[2])
}

/// Composes frames for whichever screen is active.
pub struct Composer {
    layout: Layout,
    buffers: RenderBuffers,
}

impl Composer {
    pub fn new(layout: Layout) -> Self {
        Self { layout, buffers: RenderBuffers::default() }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// `mono` selects the pre-dithered album art when the sink is 1-bit.
    pub fn compose(&mut self, fields: &DisplayFields, mono: bool) -> Bitmap {
        match fields.screen {
            FrameTarget::NowPlaying => self.now_playing(fields, mono),
            FrameTarget::Weather => self.weather(fields),
            FrameTarget::Clock => self.clock(Local::now()),
        }
    }

    fn blank(&self) -> Canvas {
        Canvas::new(self.layout.width, self.layout.height, FALLBACK_COLOR)
    }

    fn centered(&self, canvas: &mut Canvas, text: &str, y: i32, font: &MonoFont<'_>, color: [u8; 3]) {
        let style = MonoTextStyle::new(font, rgb(color));
        let text_style = TextStyleBuilder::new().alignment(Alignment::Center).baseline(Baseline::Middle).build();
        let at = Point::new(self.layout.width as i32 / 2, y);
        let _ = Text::with_text_style(text, at, style, text_style).draw(canvas);
    }

    fn sprite(&self, canvas: &mut Canvas, sprite: &AnimatedSprite, bitmap: Option<&Bitmap>, placeholder: bool) {
        let (x, y) = sprite.top_left();
        match bitmap {
            Some(bitmap) => canvas.blit(bitmap, x, y),
            None if placeholder => {
                let _ = Rectangle::new(Point::new(x, y), Size::new(sprite.size.0, sprite.size.1))
                    .into_styled(PrimitiveStyle::with_fill(rgb(PLACEHOLDER_COLOR)))
                    .draw(canvas);
            }
            None => {}
        }
    }

    /// One ticker line, drawn twice when it loops so the gap scrolls in.
    fn ticker(&self, canvas: &mut Canvas, field: &ScrollField, y: i32, font: &MonoFont<'_>, color: [u8; 3], scrolling: bool) {
        let m = self.layout.margin as i32;
        let area = Rectangle::new(
            Point::new(m, y),
            Size::new(self.layout.text_area_width(), font.character_size.height),
        );
        let mut clipped = canvas.clipped(&area);
        let style = MonoTextStyle::new(font, rgb(color));
        let offset = if scrolling { field.offset as i32 } else { 0 };
        let x = m - offset;
        let _ = Text::with_baseline(field.text(), Point::new(x, y), style, Baseline::Top).draw(&mut clipped);
        if field.active {
            let again = Point::new(x + field.max_offset as i32, y);
            let _ = Text::with_baseline(field.text(), again, style, Baseline::Top).draw(&mut clipped);
        }
    }

    pub fn now_playing(&mut self, fields: &DisplayFields, mono: bool) -> Bitmap {
        let (w, h) = (self.layout.width, self.layout.height);
        let mut canvas = match &fields.background {
            Some(bg) => Canvas::from_bitmap(bg, w, h),
            None => self.blank(),
        };

        let Some(track) = &fields.track else {
            self.centered(&mut canvas, "Nothing playing", h as i32 / 2, self.layout.line_font, fields.accents.secondary);
            return canvas.into_bitmap();
        };

        let art = if mono { fields.album_art_mono.as_deref().or(fields.album_art.as_deref()) } else { fields.album_art.as_deref() };
        let sprites = &fields.sprites;
        let album = |c: &mut Canvas| self.sprite(c, &sprites.album, art, true);
        let portrait = |c: &mut Canvas| self.sprite(c, &sprites.portrait, fields.portrait.as_deref(), false);
        if sprites.album_in_front {
            portrait(&mut canvas);
            album(&mut canvas);
        } else {
            album(&mut canvas);
            portrait(&mut canvas);
        }

        let m = self.layout.margin as i32;
        let title_h = self.layout.title_font.character_size.height as i32;
        let line_h = self.layout.line_font.character_size.height as i32;
        let scrolling = fields.settings.scrolling;
        let accents = fields.accents;
        self.ticker(&mut canvas, &fields.scroll.title, m, self.layout.title_font, accents.primary, scrolling);
        self.ticker(&mut canvas, &fields.scroll.artist, m + title_h + 1, self.layout.line_font, accents.secondary, scrolling);
        self.ticker(&mut canvas, &fields.scroll.album, m + title_h + line_h + 2, self.layout.line_font, accents.secondary, scrolling);

        // progress along the bottom edge
        let bar_h = self.layout.progress_height;
        let bar_y = h.saturating_sub(bar_h + self.layout.margin) as i32;
        let bar_w = self.layout.text_area_width();
        let filled = (bar_w as f64 * track.progress()).round() as u32;
        let _ = Rectangle::new(Point::new(m, bar_y), Size::new(bar_w, bar_h))
            .into_styled(PrimitiveStyle::with_stroke(rgb(accents.secondary), 1))
            .draw(&mut canvas);
        let _ = Rectangle::new(Point::new(m, bar_y), Size::new(filled.min(bar_w), bar_h))
            .into_styled(PrimitiveStyle::with_fill(rgb(accents.primary)))
            .draw(&mut canvas);

        if self.layout.category != LayoutCategory::Small {
            let style = MonoTextStyle::new(&FONT_6X10, rgb(accents.secondary));
            let text_style = TextStyleBuilder::new().alignment(Alignment::Right).baseline(Baseline::Bottom).build();
            let at = Point::new((w - self.layout.margin) as i32, bar_y - 1);
            let label = self.buffers.format_progress(track.position_secs, track.duration_secs);
            let _ = Text::with_text_style(label, at, style, text_style).draw(&mut canvas);
        }

        canvas.into_bitmap()
    }

    pub fn weather(&mut self, fields: &DisplayFields) -> Bitmap {
        let (w, h) = (self.layout.width, self.layout.height);
        let mut canvas = self.blank();
        let accents = fields.accents;

        let Some(report) = &fields.weather else {
            // fixed error panel
            let _ = Rectangle::new(Point::zero(), Size::new(w, h))
                .into_styled(PrimitiveStyle::with_stroke(rgb(accents.secondary), 1))
                .draw(&mut canvas);
            self.centered(&mut canvas, "Weather unavailable", h as i32 / 2, self.layout.line_font, accents.primary);
            return canvas.into_bitmap();
        };

        let m = self.layout.margin as i32;
        let mut text_x = m;
        if let Some(icon) = &fields.weather_icon {
            let y = (h as i32 - icon.height() as i32) / 2;
            canvas.blit(icon, m, y.max(0));
            text_x += icon.width() as i32 + m;
        }

        let buf = &mut self.buffers.line_buffer;
        buf.clear();
        let _ = write!(buf, "{:.0}\u{b0}C", report.temperature_c);
        let big = MonoTextStyle::new(self.layout.clock_font, rgb(accents.primary));
        let _ = Text::with_baseline(buf.as_str(), Point::new(text_x, m), big, Baseline::Top).draw(&mut canvas);

        let small = MonoTextStyle::new(self.layout.line_font, rgb(accents.secondary));
        let mut y = m + self.layout.clock_font.character_size.height as i32 + 2;
        let _ = Text::with_baseline(&report.description, Point::new(text_x, y), small, Baseline::Top).draw(&mut canvas);
        y += self.layout.line_font.character_size.height as i32 + 1;

        buf.clear();
        if let Some(feels) = report.feels_like_c {
            let _ = write!(buf, "feels {:.0}\u{b0}C ", feels);
        }
        if let Some(hum) = report.humidity_pct {
            let _ = write!(buf, "{}%", hum);
        }
        if !buf.is_empty() {
            let _ = Text::with_baseline(buf.as_str(), Point::new(text_x, y), small, Baseline::Top).draw(&mut canvas);
        }
        canvas.into_bitmap()
    }

    pub fn clock(&mut self, now: DateTime<Local>) -> Bitmap {
        let h = self.layout.height as i32;
        let mut canvas = self.blank();
        let time = &mut self.buffers.time_buffer;
        time.clear();
        let _ = write!(time, "{}", now.format("%H:%M:%S"));
        let date = &mut self.buffers.line_buffer;
        date.clear();
        let _ = write!(date, "{}", now.format("%a %d %b %Y"));

        let time = self.buffers.time_buffer;
        let date = self.buffers.line_buffer;
        let clock_h = self.layout.clock_font.character_size.height as i32;
        self.centered(&mut canvas, &time, h / 2 - clock_h / 4, self.layout.clock_font, crate::constants::DEFAULT_PRIMARY_TEXT);
        self.centered(&mut canvas, &date, h / 2 + clock_h, self.layout.line_font, crate::constants::DEFAULT_SECONDARY_TEXT);
        canvas.into_bitmap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::state::DisplayState;
    use crate::media::WeatherReport;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn track(title: &str) -> TrackState {
        TrackState {
            title: title.into(),
            artists: vec!["Someone".into()],
            album: "Record".into(),
            position_secs: 30.0,
            duration_secs: 120.0,
            is_playing: true,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_layout_categories() {
        assert_eq!(Layout::for_size(128, 64).category, LayoutCategory::Small);
        assert_eq!(Layout::for_size(256, 64).category, LayoutCategory::Medium);
        assert_eq!(Layout::for_size(320, 240).category, LayoutCategory::Large);
        assert_eq!(Layout::for_size(128, 64).line_char_width(), 6);
    }

    #[test]
    fn test_fit_scroll_activates_long_titles_only() {
        let layout = Layout::for_size(128, 64);
        let mut scroll = ScrollFields::default();
        let mut t = track("short");
        assert!(layout.fit_scroll(&mut scroll, &t));
        assert!(!scroll.title.active);
        t.title = "a title that is far too long to fit on a tiny panel".into();
        assert!(layout.fit_scroll(&mut scroll, &t));
        assert!(scroll.title.active);
        assert!(!layout.fit_scroll(&mut scroll, &t));
    }

    #[test]
    fn test_progress_label() {
        let mut b = RenderBuffers::default();
        assert_eq!(b.format_progress(75.4, 3600.0), "1:15 / 60:00");
        assert_eq!(b.format_progress(f64::NAN, -1.0), "0:00 / 0:00");
    }

    #[test]
    fn test_frames_have_screen_size() {
        let state = DisplayState::new((128, 64), FrameTarget::NowPlaying, (32, 32), (16, 16));
        let mut composer = Composer::new(Layout::for_size(128, 64));
        for screen in FrameTarget::ALL {
            state.set_screen(screen);
            let frame = composer.compose(&state.snapshot(), false);
            assert_eq!(frame.dimensions(), (128, 64));
        }
    }

    #[test]
    fn test_missing_art_draws_placeholder() {
        let state = DisplayState::new((128, 64), FrameTarget::NowPlaying, (32, 32), (16, 16));
        {
            let mut f = state.lock();
            f.track = Some(track("t"));
            f.sprites.album.position = (96.0, 32.0);
        }
        let mut composer = Composer::new(Layout::for_size(128, 64));
        // bottom-right corner pixel is clear of the text and the bar
        let frame = composer.now_playing(&state.snapshot(), false);
        assert_eq!(frame.rgb_at(127, 63), Some(PLACEHOLDER_COLOR));
    }

    #[test]
    fn test_art_is_blitted_at_sprite_position() {
        let state = DisplayState::new((128, 64), FrameTarget::NowPlaying, (32, 32), (16, 16));
        {
            let mut f = state.lock();
            f.track = Some(track("t"));
            f.sprites.album.position = (96.0, 32.0);
        }
        let hash = state.lock().sources.art;
        assert!(state.apply_image(crate::display::Slot::AlbumArt, hash, Arc::new(Bitmap::solid(32, 32, [1, 200, 3]))));
        let frame = Composer::new(Layout::for_size(128, 64)).now_playing(&state.snapshot(), false);
        assert_eq!(frame.rgb_at(127, 63), Some([1, 200, 3]));
    }

    #[test]
    fn test_weather_panel_differs_when_missing() {
        let state = DisplayState::new((128, 64), FrameTarget::Weather, (32, 32), (16, 16));
        let mut composer = Composer::new(Layout::for_size(128, 64));
        let missing = composer.weather(&state.snapshot());
        state.lock().weather = Some(WeatherReport {
            condition_code: 800,
            description: "clear".into(),
            temperature_c: 21.4,
            feels_like_c: Some(20.0),
            humidity_pct: Some(40),
        });
        let present = composer.weather(&state.snapshot());
        assert_ne!(missing.content_hash(), present.content_hash());
        // the error panel has a border
        assert_ne!(missing.rgb_at(0, 0), Some(FALLBACK_COLOR));
    }
}
