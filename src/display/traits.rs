/*
 *  display/traits.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Contract between the renderer and whatever shows the frames
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

use crate::display::error::DisplayError;

/// Native pixel format of a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorDepth {
    /// 1-bit, 8 pixels per byte, LSB first
    /// Used by: e-paper, SSD1306-class OLEDs
    Monochrome,

    /// 4-bit grayscale, 2 pixels per byte, high nibble first
    Gray4,

    /// 16-bit packed colour, little endian
    /// Used by: SPI TFT panels, most 16bpp framebuffers
    Rgb565,

    /// 24-bit colour, 3 bytes per pixel
    Rgb888,
}

impl ColorDepth {
    /// Bytes needed for a full frame of `width` x `height`.
    pub fn frame_len(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            ColorDepth::Monochrome => pixels.div_ceil(8),
            ColorDepth::Gray4 => pixels.div_ceil(2),
            ColorDepth::Rgb565 => pixels * 2,
            ColorDepth::Rgb888 => pixels * 3,
        }
    }
}

/// Sink capabilities and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCapabilities {
    /// Native width in pixels
    pub width: u32,

    /// Native height in pixels
    pub height: u32,

    /// Native colour depth
    pub color_depth: ColorDepth,

    /// Partial refreshes allowed before a full refresh is needed (e-paper).
    /// None means every write is equivalent.
    pub partial_refresh_budget: Option<u32>,
}

/// How a frame should be pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Partial,
    Full,
}

/// Final consumer of composed frames.
///
/// Writes are synchronous and may be slow; the scheduler never calls a sink
/// while holding the display state guard.
pub trait DisplaySink: Send {
    fn capabilities(&self) -> &DisplayCapabilities;

    fn dimensions(&self) -> (u32, u32) {
        let caps = self.capabilities();
        (caps.width, caps.height)
    }

    /// Push one packed frame in the sink's native format.
    fn write_frame(&mut self, frame: &[u8], mode: RefreshMode) -> Result<(), DisplayError>;

    /// Blank the panel.
    fn clear(&mut self) -> Result<(), DisplayError>;
}
