use crate::content::{Bitmap, Rgba};

/// Pixel-space rectangle. May extend past either surface; drawing clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn contains_rect(&self, other: &PixelRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// True when the rectangles share at least one pixel.
    pub fn overlaps(&self, other: &PixelRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// The drawing surface the controller paints into. Contents persist between frames.
pub trait RenderTarget {
    fn size(&self) -> (u32, u32);
    fn fill_rect(&mut self, rect: PixelRect, color: Rgba);
    /// Alpha-blends `image` with its top-left corner at `(x, y)`.
    fn blit(&mut self, image: &Bitmap, x: i32, y: i32);
    /// Alpha-blends the `source` region of `image` with its top-left corner at `(x, y)`.
    fn blit_region(&mut self, image: &Bitmap, x: i32, y: i32, source: PixelRect);
}

/// RGBA8 frame (as handed out by `pixels`) wrapped as a [`RenderTarget`].
pub struct FrameBuffer<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> FrameBuffer<'a> {
    /// `None` when the slice is too short for `width x height` RGBA pixels.
    pub fn new(frame: &'a mut [u8], width: u32, height: u32) -> Option<Self> {
        let needed = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        if frame.len() < needed {
            return None;
        }
        Some(Self {
            frame,
            width,
            height,
        })
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut color = [0u8; 4];
        color.copy_from_slice(&self.frame[offset..offset + 4]);
        Some(color)
    }

    fn write_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let dst = &mut self.frame[offset..offset + 4];
        match color[3] {
            0 => {}
            255 => dst.copy_from_slice(&color),
            alpha => {
                let blended = blend_over(color, [dst[0], dst[1], dst[2], dst[3]], alpha);
                dst.copy_from_slice(&blended);
            }
        }
    }
}

impl RenderTarget for FrameBuffer<'_> {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Rgba) {
        let start_x = rect.x.max(0);
        let start_y = rect.y.max(0);
        let end_x = rect.right().min(self.width as i32);
        let end_y = rect.bottom().min(self.height as i32);
        for y in start_y..end_y {
            for x in start_x..end_x {
                self.write_pixel(x, y, color);
            }
        }
    }

    fn blit(&mut self, image: &Bitmap, x: i32, y: i32) {
        let (width, height) = image.size();
        self.blit_region(image, x, y, PixelRect::new(0, 0, width, height));
    }

    fn blit_region(&mut self, image: &Bitmap, x: i32, y: i32, source: PixelRect) {
        for row in 0..source.height as i32 {
            let dst_y = y + row;
            if dst_y < 0 || dst_y >= self.height as i32 {
                continue;
            }
            for col in 0..source.width as i32 {
                let dst_x = x + col;
                if dst_x < 0 || dst_x >= self.width as i32 {
                    continue;
                }
                if let Some(color) = image.pixel(source.x + col, source.y + row) {
                    self.write_pixel(dst_x, dst_y, color);
                }
            }
        }
    }
}

fn blend_over(src: Rgba, dst: Rgba, alpha: u8) -> Rgba {
    let a = alpha as u32;
    let inv = 255 - a;
    let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * inv + 127) / 255) as u8;
    [
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        dst[3].max(alpha),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = [255, 0, 0, 255];
    const BLACK: Rgba = [0, 0, 0, 255];

    #[test]
    fn frame_buffer_rejects_short_slices() {
        let mut frame = vec![0u8; 15];
        assert!(FrameBuffer::new(&mut frame, 2, 2).is_none());
    }

    #[test]
    fn fill_rect_clips_to_the_frame() {
        let mut frame = vec![0u8; 2 * 2 * 4];
        let mut target = FrameBuffer::new(&mut frame, 2, 2).expect("frame");
        target.fill_rect(PixelRect::new(1, -5, 10, 10), RED);
        assert_eq!(target.pixel(1, 1), Some(RED));
        assert_eq!(target.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn blit_region_reads_from_source_offset() {
        let image = Bitmap::from_rows(&[&[BLACK, RED], &[BLACK, BLACK]]);
        let mut frame = vec![0u8; 4];
        let mut target = FrameBuffer::new(&mut frame, 1, 1).expect("frame");
        target.blit_region(&image, 0, 0, PixelRect::new(1, 0, 1, 1));
        assert_eq!(target.pixel(0, 0), Some(RED));
    }

    #[test]
    fn translucent_pixels_blend_over_existing_content() {
        let mut frame = vec![0u8; 4];
        let mut target = FrameBuffer::new(&mut frame, 1, 1).expect("frame");
        target.fill_rect(PixelRect::new(0, 0, 1, 1), [200, 200, 200, 255]);
        target.blit(&Bitmap::solid(1, 1, [0, 0, 0, 128]), 0, 0);
        let [r, g, b, a] = target.pixel(0, 0).expect("pixel");
        assert!(r < 120 && r > 80, "r={r}");
        assert_eq!((r, g, b, a), (r, r, r, 255));
    }

    #[test]
    fn rect_containment() {
        let outer = PixelRect::new(0, 0, 10, 10);
        assert!(outer.contains_rect(&PixelRect::new(2, 2, 8, 8)));
        assert!(!outer.contains_rect(&PixelRect::new(-1, 0, 2, 2)));
    }

    #[test]
    fn touching_edges_do_not_overlap() {
        let cell = PixelRect::new(0, 0, 10, 10);
        assert!(cell.overlaps(&PixelRect::new(9, 9, 10, 10)));
        assert!(!cell.overlaps(&PixelRect::new(10, 0, 10, 10)));
        assert!(!cell.overlaps(&PixelRect::new(0, -10, 10, 10)));
    }
}
