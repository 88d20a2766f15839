use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ImageReader, Rgba as ImageRgba, RgbaImage};
use thiserror::Error;

/// Straight RGBA colour, 0-255 per channel.
pub type Rgba = [u8; 4];

pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

#[derive(Debug, Error)]
pub enum BitmapError {
    #[error("failed to open image: {0}")]
    Open(#[source] std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("rgba buffer of {actual} bytes does not match {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        actual: usize,
    },
}

/// Decoded RGBA image. Tiles, sprites, overlays and rendered text all share this type.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    image: RgbaImage,
}

impl Bitmap {
    pub fn open(path: &Path) -> Result<Self, BitmapError> {
        let reader = ImageReader::open(path).map_err(BitmapError::Open)?;
        let decoded = reader.decode().map_err(BitmapError::Decode)?;
        Ok(Self {
            image: decoded.to_rgba8(),
        })
    }

    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, BitmapError> {
        let actual = rgba.len();
        RgbaImage::from_raw(width, height, rgba)
            .map(|image| Self { image })
            .ok_or(BitmapError::BufferSize {
                width,
                height,
                actual,
            })
    }

    /// Builds a bitmap from rows of colours; rows shorter than the first are padded with
    /// transparent pixels.
    pub fn from_rows(rows: &[&[Rgba]]) -> Self {
        let height = rows.len() as u32;
        let width = rows.first().map(|row| row.len()).unwrap_or(0) as u32;
        let image = RgbaImage::from_fn(width, height, |x, y| {
            let color = rows[y as usize]
                .get(x as usize)
                .copied()
                .unwrap_or(TRANSPARENT);
            ImageRgba(color)
        });
        Self { image }
    }

    pub fn solid(width: u32, height: u32, color: Rgba) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, ImageRgba(color)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// `None` outside the image.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgba> {
        if x < 0 || y < 0 {
            return None;
        }
        self.image
            .get_pixel_checked(x as u32, y as u32)
            .map(|pixel| pixel.0)
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return;
        }
        self.image.put_pixel(x as u32, y as u32, ImageRgba(color));
    }

    pub fn as_rgba(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, width: i32, height: i32, color: Rgba) {
        let start_x = x.max(0);
        let start_y = y.max(0);
        let end_x = (x + width).min(self.width() as i32);
        let end_y = (y + height).min(self.height() as i32);
        for py in start_y..end_y {
            for px in start_x..end_x {
                self.image.put_pixel(px as u32, py as u32, ImageRgba(color));
            }
        }
    }

    pub fn outline_rect(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        thickness: i32,
        color: Rgba,
    ) {
        if width <= 0 || height <= 0 || thickness <= 0 {
            return;
        }
        self.fill_rect(x, y, width, thickness, color);
        self.fill_rect(x, y + height - thickness, width, thickness, color);
        self.fill_rect(x, y, thickness, height, color);
        self.fill_rect(x + width - thickness, y, thickness, height, color);
    }

    /// Uniform nearest-neighbour scale. Dimensions never drop below one pixel.
    pub fn scaled(&self, ratio: f32) -> Bitmap {
        let width = ((self.width() as f32 * ratio).round() as u32).max(1);
        let height = ((self.height() as f32 * ratio).round() as u32).max(1);
        if (width, height) == self.size() {
            return self.clone();
        }
        Bitmap {
            image: imageops::resize(&self.image, width, height, FilterType::Nearest),
        }
    }

    /// Scales so the width becomes `width`, keeping the aspect ratio.
    pub fn scaled_to_width(&self, width: u32) -> Bitmap {
        if self.width() == 0 || self.width() == width {
            return self.clone();
        }
        self.scaled(width as f32 / self.width() as f32)
    }

    /// Scales so the larger side becomes `size`.
    pub fn scaled_to_fit(&self, size: u32) -> Bitmap {
        let largest = self.width().max(self.height());
        if largest == 0 || largest == size {
            return self.clone();
        }
        self.scaled(size as f32 / largest as f32)
    }

    pub fn mirrored(&self) -> Bitmap {
        Bitmap {
            image: imageops::flip_horizontal(&self.image),
        }
    }

    /// Copies a region; parts outside the source come out transparent.
    pub fn cropped(&self, x: u32, y: u32, width: u32, height: u32) -> Bitmap {
        let mut out = RgbaImage::new(width, height);
        let view_w = width.min(self.width().saturating_sub(x));
        let view_h = height.min(self.height().saturating_sub(y));
        if view_w > 0 && view_h > 0 {
            let view = imageops::crop_imm(&self.image, x, y, view_w, view_h).to_image();
            imageops::replace(&mut out, &view, 0, 0);
        }
        Bitmap { image: out }
    }

    /// Alpha-composites `top` over this bitmap at `(x, y)`.
    pub fn draw_over(&mut self, top: &Bitmap, x: i64, y: i64) {
        imageops::overlay(&mut self.image, &top.image, x, y);
    }
}
