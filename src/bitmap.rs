/*
 *  bitmap.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Owned, immutable pixel buffers and their content hashes
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

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// Pixel layout of a [`Bitmap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorMode {
    /// 3 bytes per pixel
    Rgb,
    /// 4 bytes per pixel, straight alpha
    Rgba,
    /// 1 byte per pixel luma
    Gray,
    /// 1 byte per pixel, 0 or 255; packed to 1bpp only at the sink
    Mono,
}

impl ColorMode {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorMode::Rgb => 3,
            ColorMode::Rgba => 4,
            ColorMode::Gray | ColorMode::Mono => 1,
        }
    }
}

/// Stable digest of pixel content, used as cache key and change detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub u64);

impl ContentHash {
    /// Hash of "no content", used when a job runs without source art.
    pub const EMPTY: ContentHash = ContentHash(0);

    /// Digest of raw encoded bytes (album art as delivered, packed frames).
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        ContentHash(hasher.finish())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// An owned pixel buffer. Never mutated once produced; share it behind an
/// `Arc` and `Arc::make_mut` if a caller really needs a private copy.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    mode: ColorMode,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("mode", &self.mode)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Bitmap {
    /// Wrap a raw buffer. Returns None when the length does not match the geometry.
    pub fn from_raw(mode: ColorMode, width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * mode.bytes_per_pixel();
        if data.len() != expected {
            return None;
        }
        Some(Self { mode, width, height, data })
    }

    /// Solid RGB fill, used for placeholders and transform fallbacks.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::from(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    pub fn mode(&self) -> ColorMode { self.mode }
    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn dimensions(&self) -> (u32, u32) { (self.width, self.height) }
    pub fn as_bytes(&self) -> &[u8] { &self.data }

    /// Digest over mode, geometry and pixels.
    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = DefaultHasher::new();
        self.mode.hash(&mut hasher);
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        self.data.hash(&mut hasher);
        ContentHash(hasher.finish())
    }

    /// RGB value at (x, y), expanding gray/mono and dropping alpha.
    pub fn rgb_at(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.mode.bytes_per_pixel();
        let i = (y as usize * self.width as usize + x as usize) * bpp;
        let px = &self.data[i..i + bpp];
        Some(match self.mode {
            ColorMode::Rgb | ColorMode::Rgba => [px[0], px[1], px[2]],
            ColorMode::Gray | ColorMode::Mono => [px[0], px[0], px[0]],
        })
    }

    /// Alpha at (x, y); opaque for every mode except Rgba.
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        match self.mode {
            ColorMode::Rgba if x < self.width && y < self.height => {
                self.data[(y as usize * self.width as usize + x as usize) * 4 + 3]
            }
            _ => 255,
        }
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        match self.mode {
            ColorMode::Rgb => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .unwrap_or_else(|| RgbImage::new(self.width, self.height)),
            _ => RgbImage::from_fn(self.width, self.height, |x, y| {
                Rgb(self.rgb_at(x, y).unwrap_or([0, 0, 0]))
            }),
        }
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageRgb8(self.to_rgb_image())
    }
}

impl From<RgbImage> for Bitmap {
    fn from(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self { mode: ColorMode::Rgb, width, height, data: img.into_raw() }
    }
}

impl From<GrayImage> for Bitmap {
    fn from(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self { mode: ColorMode::Gray, width, height, data: img.into_raw() }
    }
}

impl From<DynamicImage> for Bitmap {
    fn from(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => Bitmap::from(gray),
            DynamicImage::ImageRgba8(rgba) => {
                let (width, height) = rgba.dimensions();
                Self { mode: ColorMode::Rgba, width, height, data: rgba.into_raw() }
            }
            other => Bitmap::from(other.to_rgb8()),
        }
    }
}

/// Threshold a gray image into a Mono bitmap (values already 0/255 after dithering).
pub fn mono_from_gray(img: GrayImage) -> Bitmap {
    let (width, height) = img.dimensions();
    let data = img.pixels().map(|Luma([v])| if *v >= 128 { 255 } else { 0 }).collect();
    Bitmap { mode: ColorMode::Mono, width, height, data }
}
