/*
 *  pipeline/transforms.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Pure image transforms run by the worker pool
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

//! Every function here takes immutable input and returns owned output.
//! Nothing touches shared state, which is what lets the pool run them
//! side by side.

use std::sync::Arc;

use image::imageops::{self, BiLevel, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use log::warn;
use thiserror::Error;

use crate::bitmap::{mono_from_gray, Bitmap, ContentHash};
use crate::cache::Variant;
use crate::constants::*;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("transform needs source art but none was given")]
    EmptyInput,
    #[error("target size {0}x{1} is empty")]
    ZeroSize(u32, u32),
    #[error("transform panicked: {0}")]
    Panicked(String),
}

/// Source material for a job.
#[derive(Debug, Clone)]
pub enum JobInput {
    /// Encoded bytes as delivered (jpeg/png/...)
    Encoded(Arc<[u8]>),
    /// Already decoded pixels
    Decoded(Arc<Bitmap>),
    /// No art; only meaningful for background generation
    Empty,
}

impl JobInput {
    pub fn content_hash(&self) -> ContentHash {
        match self {
            JobInput::Encoded(bytes) => ContentHash::of_bytes(bytes),
            JobInput::Decoded(bitmap) => bitmap.content_hash(),
            JobInput::Empty => ContentHash::EMPTY,
        }
    }

    fn decode(&self) -> Result<DynamicImage, TransformError> {
        self.decode_optional()?.ok_or(TransformError::EmptyInput)
    }

    fn decode_optional(&self) -> Result<Option<DynamicImage>, TransformError> {
        match self {
            JobInput::Encoded(bytes) => Ok(Some(image::load_from_memory(bytes)?)),
            JobInput::Decoded(bitmap) => Ok(Some(bitmap.to_dynamic())),
            JobInput::Empty => Ok(None),
        }
    }
}

/// Two text colours picked to contrast with the art.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccentColors {
    pub primary: [u8; 3],
    pub secondary: [u8; 3],
}

impl Default for AccentColors {
    fn default() -> Self {
        Self { primary: DEFAULT_PRIMARY_TEXT, secondary: DEFAULT_SECONDARY_TEXT }
    }
}

#[derive(Debug, Clone)]
pub enum JobOutput {
    Image(Bitmap),
    Accents(AccentColors),
}

/// Run one transform.
pub fn run(input: &JobInput, size: (u32, u32), variant: Variant) -> Result<JobOutput, TransformError> {
    if size.0 == 0 || size.1 == 0 {
        return Err(TransformError::ZeroSize(size.0, size.1));
    }
    match variant {
        Variant::Background => {
            // unreadable art still gets a background: the no-art gradient
            let art = input.decode_optional().unwrap_or_else(|e| {
                warn!("background art unreadable ({}), using gradient", e);
                None
            });
            Ok(JobOutput::Image(background_composite(art.as_ref(), size)))
        }
        Variant::Resize => Ok(JobOutput::Image(thumbnail(&input.decode()?, size))),
        Variant::Dither => Ok(JobOutput::Image(dither(&input.decode()?, size))),
        Variant::Accent => Ok(JobOutput::Accents(accent_colors(&input.decode()?))),
    }
}

/// Deterministic output for a variant when its transform failed.
pub fn fallback(variant: Variant, size: (u32, u32)) -> JobOutput {
    let (w, h) = (size.0.max(1), size.1.max(1));
    match variant {
        Variant::Background => JobOutput::Image(gradient((w, h))),
        Variant::Accent => JobOutput::Accents(AccentColors::default()),
        Variant::Dither => JobOutput::Image(mono_from_gray(image::GrayImage::new(w, h))),
        Variant::Resize => JobOutput::Image(Bitmap::solid(w, h, FALLBACK_COLOR)),
    }
}

/// Explicit "substitute the fallback on error" step for transform results.
pub trait OrFallback {
    fn or_fallback(self, variant: Variant, size: (u32, u32)) -> JobOutput;
}

impl OrFallback for Result<JobOutput, TransformError> {
    fn or_fallback(self, variant: Variant, size: (u32, u32)) -> JobOutput {
        self.unwrap_or_else(|e| {
            warn!("{:?} transform failed ({}), using fallback", variant, e);
            fallback(variant, size)
        })
    }
}

fn mean_rgb(img: &RgbImage) -> [f32; 3] {
    let n = (img.width() as u64 * img.height() as u64).max(1) as f32;
    let mut sum = [0u64; 3];
    for Rgb(px) in img.pixels() {
        for c in 0..3 {
            sum[c] += px[c] as u64;
        }
    }
    [sum[0] as f32 / n, sum[1] as f32 / n, sum[2] as f32 / n]
}

fn scale_rgb(rgb: [f32; 3], factor: f32) -> [u8; 3] {
    rgb.map(|c| (c * factor).round().clamp(0.0, 255.0) as u8)
}

/// Opacity of column `x` in a strip `width` wide with a `fade` pixel ramp on both sides.
pub fn fade_alpha(x: u32, width: u32, fade: u32) -> f32 {
    if width == 0 || fade == 0 {
        return 1.0;
    }
    let edge = x.min(width.saturating_sub(1).saturating_sub(x));
    if edge >= fade {
        1.0
    } else {
        (edge as f32 / fade as f32).powf(FADE_EXPONENT)
    }
}

/// Vertical gradient over the base colour, top bright to bottom dim.
pub fn gradient(size: (u32, u32)) -> Bitmap {
    let (w, h) = size;
    let span = h.saturating_sub(1).max(1) as f32;
    let base = GRADIENT_BASE.map(|c| c as f32);
    let img = RgbImage::from_fn(w, h, |_, y| {
        let factor = 1.0 - (1.0 - GRADIENT_FLOOR) * (y as f32 / span);
        Rgb(scale_rgb(base, factor))
    });
    Bitmap::from(img)
}

/// Full-canvas backdrop: darkened average colour, with a blurred, dimmed and
/// edge-faded copy of the art centred on top.
pub fn background_composite(art: Option<&DynamicImage>, size: (u32, u32)) -> Bitmap {
    let Some(art) = art else {
        return gradient(size);
    };
    let (w, h) = size;
    let (aw, ah) = art.dimensions();
    if aw == 0 || ah == 0 {
        return gradient(size);
    }

    let swatch = art.resize_exact(SWATCH_SIZE, SWATCH_SIZE, FilterType::Triangle).to_rgb8();
    let fill = scale_rgb(mean_rgb(&swatch), 1.0 - SWATCH_DARKEN);
    let mut canvas = RgbImage::from_pixel(w, h, Rgb(fill));

    let scaled_w = ((aw as u64 * h as u64) / ah as u64).max(1) as u32;
    let scaled = art.resize_exact(scaled_w, h, FilterType::Triangle).to_rgb8();
    let blurred = imageops::blur(&scaled, BACKGROUND_BLUR_SIGMA);

    let fade = FADE_WIDTH.min(scaled_w / 2);
    let x0 = (w as i64 - scaled_w as i64) / 2;
    for (x, y, Rgb(src)) in blurred.enumerate_pixels() {
        let cx = x0 + x as i64;
        if cx < 0 || cx >= w as i64 {
            continue;
        }
        let alpha = fade_alpha(x, scaled_w, fade);
        let Rgb(dst) = canvas.get_pixel_mut(cx as u32, y);
        for c in 0..3 {
            let s = src[c] as f32 * BACKGROUND_DIM;
            let d = dst[c] as f32;
            dst[c] = (d * (1.0 - alpha) + s * alpha).round().clamp(0.0, 255.0) as u8;
        }
    }
    Bitmap::from(canvas)
}

/// Bilinear resize into a bounding box, aspect preserved.
pub fn thumbnail(art: &DynamicImage, size: (u32, u32)) -> Bitmap {
    Bitmap::from(art.resize(size.0, size.1, FilterType::Triangle).to_rgb8())
}

/// Resize, gray, Floyd-Steinberg to black/white.
pub fn dither(art: &DynamicImage, size: (u32, u32)) -> Bitmap {
    let mut gray = art.resize(size.0, size.1, FilterType::Triangle).to_luma8();
    imageops::dither(&mut gray, &BiLevel);
    mono_from_gray(gray)
}

/// Pick text colours from the art's own palette: opposite hue, boosted
/// saturation, brightness tiered on the art's value.
pub fn accent_colors(art: &DynamicImage) -> AccentColors {
    let sample = art
        .resize_exact(ACCENT_SAMPLE_SIZE, ACCENT_SAMPLE_SIZE, FilterType::Triangle)
        .to_rgb8();
    let [r, g, b] = mean_rgb(&sample);
    let (h, s, v) = rgb_to_hsv(r / 255.0, g / 255.0, b / 255.0);

    let hue = (h + 0.5).rem_euclid(1.0);
    let sat = (s + ACCENT_SAT_BOOST).min(ACCENT_SAT_MAX);
    let val = if v < 0.3 {
        0.9
    } else if v > 0.7 {
        0.8
    } else {
        0.85
    };

    let hue2 = (hue + ACCENT_SECONDARY_HUE_SHIFT).rem_euclid(1.0);
    let sat2 = sat * ACCENT_SECONDARY_SAT_SCALE;
    let val2 = val * ACCENT_SECONDARY_VAL_SCALE;

    AccentColors {
        primary: to_bytes(hsv_to_rgb(hue, sat, val)),
        secondary: to_bytes(hsv_to_rgb(hue2, sat2, val2)),
    }
}

fn to_bytes((r, g, b): (f32, f32, f32)) -> [u8; 3] {
    [r, g, b].map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8)
}

/// Components in 0..=1, hue as a fraction of a turn.
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let maxc = r.max(g).max(b);
    let minc = r.min(g).min(b);
    let v = maxc;
    if maxc == minc {
        return (0.0, 0.0, v);
    }
    let range = maxc - minc;
    let s = range / maxc;
    let rc = (maxc - r) / range;
    let gc = (maxc - g) / range;
    let bc = (maxc - b) / range;
    let h = if r == maxc {
        bc - gc
    } else if g == maxc {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((h / 6.0).rem_euclid(1.0), s, v)
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        return (v, v, v);
    }
    let h6 = h.rem_euclid(1.0) * 6.0;
    let i = h6.floor();
    let f = h6 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i as u32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::ColorMode;

    fn art(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(rgb)))
    }

    fn encoded_png(w: u32, h: u32) -> Arc<[u8]> {
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 90]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner().into()
    }

    #[test]
    fn test_hsv_round_trip_primaries() {
        let (h, s, v) = rgb_to_hsv(1.0, 0.0, 0.0);
        assert_eq!((h, s, v), (0.0, 1.0, 1.0));
        let (r, g, b) = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!(r.abs() < 1e-5 && (g - 1.0).abs() < 1e-5 && b.abs() < 1e-5);
    }

    #[test]
    fn test_accent_is_opposite_hue_and_tiered() {
        // dark red art: hue 0, v ~0.2 -> cyan-ish accent at brightness 0.9
        let accents = accent_colors(&art(64, 64, [51, 0, 0]));
        let [r, g, b] = accents.primary;
        let (h, s, v) = rgb_to_hsv(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        assert!((h - 0.5).abs() < 0.01, "hue {h}");
        assert!((s - 0.9).abs() < 0.01, "sat {s}");
        assert!((v - 0.9).abs() < 0.01, "val {v}");
        assert_ne!(accents.primary, accents.secondary);
    }

    #[test]
    fn test_accent_is_deterministic() {
        let a = accent_colors(&art(20, 30, [120, 200, 40]));
        let b = accent_colors(&art(20, 30, [120, 200, 40]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fade_alpha_profile() {
        assert_eq!(fade_alpha(0, 200, 60), 0.0);
        assert_eq!(fade_alpha(199, 200, 60), 0.0);
        assert_eq!(fade_alpha(100, 200, 60), 1.0);
        let quarter = fade_alpha(15, 200, 60);
        assert!((quarter - 0.25f32.powf(FADE_EXPONENT)).abs() < 1e-6);
        // symmetric
        assert_eq!(fade_alpha(10, 200, 60), fade_alpha(189, 200, 60));
    }

    #[test]
    fn test_background_without_art_is_gradient() {
        let bmp = background_composite(None, (40, 30));
        assert_eq!(bmp.dimensions(), (40, 30));
        let top = bmp.rgb_at(0, 0).unwrap();
        let bottom = bmp.rgb_at(0, 29).unwrap();
        assert_eq!(top, GRADIENT_BASE);
        assert!(bottom[2] < top[2]);
    }

    #[test]
    fn test_background_edges_show_darkened_swatch() {
        let bmp = background_composite(Some(&art(50, 50, [200, 100, 50])), (320, 100));
        assert_eq!(bmp.dimensions(), (320, 100));
        // far left is outside the art strip: 70% of the average colour
        assert_eq!(bmp.rgb_at(0, 50), Some([140, 70, 35]));
        // centre is the dimmed art
        assert_eq!(bmp.rgb_at(160, 50), Some([120, 60, 30]));
    }

    #[test]
    fn test_thumbnail_fits_box() {
        let bmp = thumbnail(&art(200, 100, [1, 2, 3]), (64, 64));
        assert_eq!(bmp.dimensions(), (64, 32));
    }

    #[test]
    fn test_dither_is_mono() {
        let bmp = dither(&art(32, 32, [128, 128, 128]), (16, 16));
        assert_eq!(bmp.mode(), ColorMode::Mono);
        assert!(bmp.as_bytes().iter().all(|b| *b == 0 || *b == 255));
        assert!(bmp.as_bytes().iter().any(|b| *b == 255));
    }

    #[test]
    fn test_run_decodes_encoded_input() {
        let input = JobInput::Encoded(encoded_png(16, 16));
        match run(&input, (8, 8), Variant::Resize).unwrap() {
            JobOutput::Image(bmp) => assert_eq!(bmp.dimensions(), (8, 8)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_garbage_bytes_fall_back() {
        let input = JobInput::Encoded(Arc::from(&b"not an image"[..]));
        let result = run(&input, (8, 8), Variant::Resize);
        assert!(matches!(result, Err(TransformError::Decode(_))));
        match result.or_fallback(Variant::Resize, (8, 8)) {
            JobOutput::Image(bmp) => assert_eq!(bmp.rgb_at(3, 3), Some(FALLBACK_COLOR)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unreadable_art_background_is_gradient() {
        let input = JobInput::Encoded(Arc::from(&b"still not an image"[..]));
        match run(&input, (16, 8), Variant::Background).unwrap() {
            JobOutput::Image(bmp) => assert_eq!(bmp.as_bytes(), gradient((16, 8)).as_bytes()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_input_only_valid_for_background() {
        assert!(run(&JobInput::Empty, (8, 8), Variant::Background).is_ok());
        assert!(matches!(run(&JobInput::Empty, (8, 8), Variant::Accent), Err(TransformError::EmptyInput)));
        assert!(matches!(run(&JobInput::Empty, (0, 8), Variant::Background), Err(TransformError::ZeroSize(0, 8))));
    }
}
