/*
 *  display/canvas.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Runtime-sized RGB draw target for embedded-graphics
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

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use image::{Rgb, RgbImage};

use crate::bitmap::Bitmap;

/// Frame being composed. Text and primitives draw through embedded-graphics,
/// bitmaps are copied in with `blit`.
#[derive(Debug, Clone)]
pub struct Canvas {
    img: RgbImage,
}

#[inline]
fn to_rgb(c: Rgb888) -> Rgb<u8> {
    Rgb([c.r(), c.g(), c.b()])
}

impl Canvas {
    pub fn new(width: u32, height: u32, fill: [u8; 3]) -> Self {
        Self { img: RgbImage::from_pixel(width, height, Rgb(fill)) }
    }

    /// Start from a full-screen bitmap (the background), resized if needed.
    pub fn from_bitmap(bitmap: &Bitmap, width: u32, height: u32) -> Self {
        let mut img = bitmap.to_rgb_image();
        if img.dimensions() != (width, height) {
            img = image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle);
        }
        Self { img }
    }

    pub fn width(&self) -> u32 { self.img.width() }
    pub fn height(&self) -> u32 { self.img.height() }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.img.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Copy `bitmap` with its top-left at (x, y), clipped, alpha blended.
    pub fn blit(&mut self, bitmap: &Bitmap, x: i32, y: i32) {
        let (w, h) = bitmap.dimensions();
        for by in 0..h {
            let cy = y as i64 + by as i64;
            if cy < 0 || cy >= self.img.height() as i64 {
                continue;
            }
            for bx in 0..w {
                let cx = x as i64 + bx as i64;
                if cx < 0 || cx >= self.img.width() as i64 {
                    continue;
                }
                let Some(src) = bitmap.rgb_at(bx, by) else { continue };
                let alpha = bitmap.alpha_at(bx, by);
                let dst = self.img.get_pixel_mut(cx as u32, cy as u32);
                if alpha == 255 {
                    dst.0 = src;
                } else if alpha > 0 {
                    let a = alpha as u16;
                    for c in 0..3 {
                        dst.0[c] = ((src[c] as u16 * a + dst.0[c] as u16 * (255 - a)) / 255) as u8;
                    }
                }
            }
        }
    }

    pub fn into_bitmap(self) -> Bitmap {
        Bitmap::from(self.img)
    }

    #[inline]
    fn put(&mut self, p: Point, c: Rgb888) {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < self.img.width() && (p.y as u32) < self.img.height() {
            self.img.put_pixel(p.x as u32, p.y as u32, to_rgb(c));
        }
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.img.width(), self.img.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            self.put(p, c);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let fill = to_rgb(color);
        for px in self.img.pixels_mut() {
            *px = fill;
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        // clip first so off-screen fills cost nothing
        let area = area.intersection(&self.bounding_box());
        let Some(bottom_right) = area.bottom_right() else { return Ok(()) };
        let fill = to_rgb(color);
        for y in area.top_left.y..=bottom_right.y {
            for x in area.top_left.x..=bottom_right.x {
                self.img.put_pixel(x as u32, y as u32, fill);
            }
        }
        Ok(())
    }
}
