/*
 *  display/framebuffer.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Final rotation, resize and colour-depth packing before a frame
 *  is handed to the sink
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

use image::imageops::{self, BiLevel, FilterType};
use image::{DynamicImage, GrayImage, RgbImage};

use crate::bitmap::{Bitmap, ColorMode, ContentHash};
use crate::display::error::DisplayError;
use crate::display::traits::{ColorDepth, DisplayCapabilities};

/// A frame in the sink's native byte layout, with the hash used for
/// duplicate suppression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedFrame {
    pub bytes: Vec<u8>,
    pub hash: ContentHash,
}

pub fn validate_rotation(degrees: u16) -> Result<(), DisplayError> {
    match degrees {
        0 | 90 | 180 | 270 => Ok(()),
        other => Err(DisplayError::InvalidRotation(other)),
    }
}

fn rotate(img: RgbImage, degrees: u16) -> Result<RgbImage, DisplayError> {
    Ok(match degrees {
        0 => img,
        90 => imageops::rotate90(&img),
        180 => imageops::rotate180(&img),
        270 => imageops::rotate270(&img),
        other => return Err(DisplayError::InvalidRotation(other)),
    })
}

/// Rotate, fit to the native resolution and pack to the native depth.
pub fn pack(frame: &Bitmap, caps: &DisplayCapabilities, rotate_deg: u16) -> Result<PackedFrame, DisplayError> {
    if caps.width == 0 || caps.height == 0 {
        return Err(DisplayError::InvalidConfiguration("sink has no pixels".into()));
    }
    let mut img = rotate(frame.to_rgb_image(), rotate_deg)?;
    if img.dimensions() != (caps.width, caps.height) {
        img = imageops::resize(&img, caps.width, caps.height, FilterType::Triangle);
    }

    let bytes = match caps.color_depth {
        ColorDepth::Monochrome => {
            let mut gray = DynamicImage::ImageRgb8(img).to_luma8();
            // already 1-bit content does not need a second dither pass
            if frame.mode() != ColorMode::Mono || rotate_deg != 0 {
                imageops::dither(&mut gray, &BiLevel);
            }
            pack_mono(&gray)
        }
        ColorDepth::Gray4 => pack_gray4(&DynamicImage::ImageRgb8(img).to_luma8()),
        ColorDepth::Rgb565 => pack_rgb565(&img),
        ColorDepth::Rgb888 => img.into_raw(),
    };

    let expected = caps.color_depth.frame_len(caps.width, caps.height);
    if bytes.len() != expected {
        return Err(DisplayError::BufferSizeMismatch { expected, actual: bytes.len() });
    }
    let hash = ContentHash::of_bytes(&bytes);
    Ok(PackedFrame { bytes, hash })
}

/// 8 pixels per byte (LSB first); luma >= 128 is on
pub fn pack_mono(gray: &GrayImage) -> Vec<u8> {
    let pixels = gray.as_raw();
    let mut bytes = vec![0u8; pixels.len().div_ceil(8)];
    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel >= 128 {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// 2 pixels per byte (high nibble first)
pub fn pack_gray4(gray: &GrayImage) -> Vec<u8> {
    let pixels = gray.as_raw();
    let mut bytes = vec![0u8; pixels.len().div_ceil(2)];
    for (i, &pixel) in pixels.iter().enumerate() {
        let value = pixel >> 4;
        if i % 2 == 0 {
            bytes[i / 2] |= value << 4;
        } else {
            bytes[i / 2] |= value;
        }
    }
    bytes
}

/// RGB565 little endian
pub fn pack_rgb565(img: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(img.as_raw().len() / 3 * 2);
    for px in img.pixels() {
        let [r, g, b] = px.0;
        let v = ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3);
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn caps(w: u32, h: u32, depth: ColorDepth) -> DisplayCapabilities {
        DisplayCapabilities { width: w, height: h, color_depth: depth, partial_refresh_budget: None }
    }

    #[test]
    fn test_pack_mono_lsb_first() {
        let gray = GrayImage::from_fn(9, 1, |x, _| Luma([if x == 0 || x == 8 { 255 } else { 0 }]));
        assert_eq!(pack_mono(&gray), vec![0b0000_0001, 0b0000_0001]);
    }

    #[test]
    fn test_pack_gray4_high_nibble_first() {
        let gray = GrayImage::from_fn(3, 1, |x, _| Luma([[0xF0, 0x10, 0x80][x as usize]]));
        assert_eq!(pack_gray4(&gray), vec![0xF1, 0x80]);
    }

    #[test]
    fn test_pack_rgb565() {
        let img = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        assert_eq!(pack_rgb565(&img), vec![0x00, 0xF8]);
        let img = RgbImage::from_pixel(1, 1, Rgb([0, 255, 0]));
        assert_eq!(pack_rgb565(&img), 0x07E0u16.to_le_bytes().to_vec());
    }

    #[test]
    fn test_pack_rotates_to_native_orientation() {
        // portrait composition for a landscape panel
        let frame = Bitmap::solid(2, 4, [255, 255, 255]);
        let packed = pack(&frame, &caps(4, 2, ColorDepth::Rgb888), 90).unwrap();
        assert_eq!(packed.bytes.len(), 4 * 2 * 3);
        assert!(packed.bytes.iter().all(|b| *b == 255));
    }

    #[test]
    fn test_pack_resizes_and_sizes_match() {
        let frame = Bitmap::solid(64, 32, [0, 0, 0]);
        for depth in [ColorDepth::Monochrome, ColorDepth::Gray4, ColorDepth::Rgb565, ColorDepth::Rgb888] {
            let packed = pack(&frame, &caps(128, 64, depth), 0).unwrap();
            assert_eq!(packed.bytes.len(), depth.frame_len(128, 64));
        }
    }

    #[test]
    fn test_bad_rotation_rejected() {
        let frame = Bitmap::solid(4, 4, [0, 0, 0]);
        assert!(matches!(
            pack(&frame, &caps(4, 4, ColorDepth::Rgb888), 45),
            Err(DisplayError::InvalidRotation(45))
        ));
        assert!(validate_rotation(270).is_ok());
    }

    #[test]
    fn test_identical_frames_hash_equal() {
        let a = pack(&Bitmap::solid(8, 8, [9, 9, 9]), &caps(8, 8, ColorDepth::Rgb565), 0).unwrap();
        let b = pack(&Bitmap::solid(8, 8, [9, 9, 9]), &caps(8, 8, ColorDepth::Rgb565), 0).unwrap();
        assert_eq!(a.hash, b.hash);
    }
}
