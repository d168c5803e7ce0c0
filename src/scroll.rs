/*
 *  scroll.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Ticker state for text that overflows its field
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

use crate::constants::{SCROLL_LOOP_GAP, SCROLL_STEP};

/// Width in pixels of `text` in a monospace font.
pub fn text_width(text: &str, char_width: u32) -> u32 {
    text.chars().count() as u32 * char_width
}

/// Scroll state for one line of text.
/// Invariant: `offset < max_offset` while active, `offset == 0` otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollField {
    text: String,
    pub offset: u32,
    pub max_offset: u32,
    pub active: bool,
}

impl ScrollField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Track new text. Only a real change resets the ticker; the same text
    /// re-measured against a different width just re-evaluates overflow.
    /// Returns true if the field was reset.
    pub fn set_text(&mut self, text: &str, text_width: u32, available_width: u32) -> bool {
        let changed = self.text != text;
        if changed {
            self.text = text.to_string();
            self.offset = 0;
        }
        let overflows = text_width > available_width;
        if overflows {
            // loop ticker: text, a gap, then the text again
            self.max_offset = text_width + SCROLL_LOOP_GAP;
            self.active = true;
            if self.offset >= self.max_offset {
                self.offset = 0;
            }
        } else {
            self.reset_offsets();
        }
        changed
    }

    /// Advance one step, wrapping modulo `max_offset`.
    pub fn tick(&mut self) {
        if !self.active || self.max_offset == 0 {
            return;
        }
        self.offset = (self.offset + SCROLL_STEP) % self.max_offset;
    }

    fn reset_offsets(&mut self) {
        self.offset = 0;
        self.max_offset = 0;
        self.active = false;
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.reset_offsets();
    }
}

/// The three scrollable now-playing lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollFields {
    pub title: ScrollField,
    pub artist: ScrollField,
    pub album: ScrollField,
}

impl ScrollFields {
    pub fn tick_all(&mut self) {
        self.title.tick();
        self.artist.tick();
        self.album.tick();
    }

    pub fn clear_all(&mut self) {
        self.title.clear();
        self.artist.clear();
        self.album.clear();
    }

    pub fn any_active(&self) -> bool {
        self.title.active || self.artist.active || self.album.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_stays_inactive() {
        let mut f = ScrollField::new();
        f.set_text("hello", text_width("hello", 6), 100);
        assert!(!f.active);
        f.tick();
        assert_eq!(f.offset, 0);
    }

    #[test]
    fn test_overflowing_text_activates() {
        let mut f = ScrollField::new();
        let w = text_width("a rather long song title", 6);
        f.set_text("a rather long song title", w, 60);
        assert!(f.active);
        assert_eq!(f.max_offset, w + SCROLL_LOOP_GAP);
        f.tick();
        assert_eq!(f.offset, SCROLL_STEP);
    }

    #[test]
    fn test_wrap_law() {
        for width in [61u32, 64, 99, 150, 301] {
            let mut f = ScrollField::new();
            let text = "x".repeat(width as usize);
            f.set_text(&text, width, 60);
            assert!(f.active);
            for _ in 0..3 {
                for _ in 0..f.max_offset {
                    f.tick();
                    assert!(f.offset < f.max_offset);
                }
                assert_eq!(f.offset, 0, "max_offset {}", f.max_offset);
            }
        }
    }

    #[test]
    fn test_text_change_resets() {
        let mut f = ScrollField::new();
        f.set_text("first long title here", 126, 60);
        for _ in 0..5 {
            f.tick();
        }
        assert!(f.offset > 0);
        // same text keeps position
        assert!(!f.set_text("first long title here", 126, 60));
        assert_eq!(f.offset, 10);
        assert!(f.set_text("second", 36, 60));
        assert_eq!(f.offset, 0);
        assert!(!f.active);
    }

    #[test]
    fn test_unicode_width_counts_chars() {
        assert_eq!(text_width("Björk", 6), 30);
    }
}
