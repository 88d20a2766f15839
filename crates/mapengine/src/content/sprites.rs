use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::bitmap::Bitmap;
use crate::scene::Facing;

/// A sheet file cut into equally sized frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpriteSheetSpec {
    pub file: String,
    pub width: u32,
    /// Defaults to the sheet height (a single row).
    #[serde(default)]
    pub height: Option<u32>,
}

impl SpriteSheetSpec {
    pub fn new(file: impl Into<String>, width: u32) -> Self {
        Self {
            file: file.into(),
            width,
            height: None,
        }
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }
}

/// Cuts `sheet` into rows of `width` x `height` frames, left to right, top to bottom.
/// Partial frames at the right or bottom edge are padded with transparency.
pub fn slice_sheet(sheet: &Bitmap, width: u32, height: u32) -> Vec<Vec<Bitmap>> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    (0..sheet.height())
        .step_by(height as usize)
        .map(|offset_y| {
            (0..sheet.width())
                .step_by(width as usize)
                .map(|offset_x| sheet.cropped(offset_x, offset_y, width, height))
                .collect()
        })
        .collect()
}

/// Animation frames per facing. Frame 0 is the resting frame.
#[derive(Debug, Clone, Default)]
pub struct FacingImages {
    frames: HashMap<Facing, Vec<Rc<Bitmap>>>,
}

impl FacingImages {
    /// Row 0 faces right and, mirrored, left. Row 1 (or row 0) faces up, row 2 (or the
    /// mirrored row 0) faces down.
    pub fn from_rows(rows: &[Vec<Rc<Bitmap>>]) -> Option<Self> {
        let right = rows.first()?.clone();
        if right.is_empty() {
            return None;
        }
        let left: Vec<Rc<Bitmap>> = right
            .iter()
            .map(|frame| Rc::new(frame.mirrored()))
            .collect();
        let up = rows.get(1).cloned().unwrap_or_else(|| right.clone());
        let down = rows.get(2).cloned().unwrap_or_else(|| left.clone());

        let mut frames = HashMap::new();
        frames.insert(Facing::Right, right);
        frames.insert(Facing::Left, left);
        frames.insert(Facing::Up, up);
        frames.insert(Facing::Down, down);
        Some(Self { frames })
    }

    /// Single image objects: up/right use the image, down/left its mirror.
    pub fn auto_flip(image: Rc<Bitmap>) -> Self {
        let mirrored = Rc::new(image.mirrored());
        let mut frames = HashMap::new();
        frames.insert(Facing::Right, vec![Rc::clone(&image)]);
        frames.insert(Facing::Up, vec![image]);
        frames.insert(Facing::Left, vec![Rc::clone(&mirrored)]);
        frames.insert(Facing::Down, vec![mirrored]);
        Self { frames }
    }

    pub fn frames(&self, facing: Facing) -> &[Rc<Bitmap>] {
        self.frames.get(&facing).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn resting(&self, facing: Facing) -> Option<&Rc<Bitmap>> {
        self.frames(facing).first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Rgba;

    const RED: Rgba = [255, 0, 0, 255];
    const GREEN: Rgba = [0, 255, 0, 255];
    const BLUE: Rgba = [0, 0, 255, 255];

    fn sheet_2x2() -> Bitmap {
        // Two rows of two 1x1 frames.
        Bitmap::from_rows(&[&[RED, GREEN], &[BLUE, RED]])
    }

    #[test]
    fn slicing_walks_rows_then_columns() {
        let rows = slice_sheet(&sheet_2x2(), 1, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[0][1].pixel(0, 0), Some(GREEN));
        assert_eq!(rows[1][0].pixel(0, 0), Some(BLUE));
    }

    #[test]
    fn zero_sized_frames_produce_nothing() {
        assert!(slice_sheet(&sheet_2x2(), 0, 1).is_empty());
    }

    #[test]
    fn single_row_sheet_mirrors_left_and_reuses_rows() {
        let strip = Bitmap::from_rows(&[&[RED, GREEN]]);
        let rows: Vec<Vec<Rc<Bitmap>>> = slice_sheet(&strip, 2, 1)
            .into_iter()
            .map(|row| row.into_iter().map(Rc::new).collect())
            .collect();
        let images = FacingImages::from_rows(&rows).expect("images");

        let right = images.resting(Facing::Right).expect("right");
        let left = images.resting(Facing::Left).expect("left");
        assert_eq!(right.pixel(0, 0), Some(RED));
        assert_eq!(left.pixel(0, 0), Some(GREEN));
        assert!(Rc::ptr_eq(right, images.resting(Facing::Up).expect("up")));
        assert!(Rc::ptr_eq(left, images.resting(Facing::Down).expect("down")));
    }

    #[test]
    fn extra_rows_drive_up_and_down() {
        let rows: Vec<Vec<Rc<Bitmap>>> = vec![
            vec![Rc::new(Bitmap::solid(1, 1, RED))],
            vec![Rc::new(Bitmap::solid(1, 1, GREEN))],
            vec![Rc::new(Bitmap::solid(1, 1, BLUE))],
        ];
        let images = FacingImages::from_rows(&rows).expect("images");
        assert_eq!(
            images.resting(Facing::Up).and_then(|img| img.pixel(0, 0)),
            Some(GREEN)
        );
        assert_eq!(
            images.resting(Facing::Down).and_then(|img| img.pixel(0, 0)),
            Some(BLUE)
        );
    }

    #[test]
    fn auto_flip_shares_the_source_image() {
        let image = Rc::new(Bitmap::from_rows(&[&[RED, BLUE]]));
        let images = FacingImages::auto_flip(Rc::clone(&image));
        assert!(Rc::ptr_eq(
            images.resting(Facing::Right).expect("right"),
            &image
        ));
        assert_eq!(
            images.resting(Facing::Left).and_then(|img| img.pixel(0, 0)),
            Some(BLUE)
        );
    }
}
