use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use super::{Controller, FrameStats};
use crate::app::rendering::{PixelRect, RenderTarget};
use crate::content::{Bitmap, Rgba};
use crate::scene::command::BlobId;
use crate::scene::object::ObjectId;
use crate::scene::position::Position;
use crate::scene::scene_map::TileContent;

/// What was last painted into a screen cell.
#[derive(Debug, Clone)]
pub(super) enum DrawnTile {
    Color(Rgba),
    Image(Rc<Bitmap>),
}

impl PartialEq for DrawnTile {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DrawnTile::Color(a), DrawnTile::Color(b)) => a == b,
            (DrawnTile::Image(a), DrawnTile::Image(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum SpriteKey {
    Actor(ObjectId),
    Blob(BlobId),
}

/// A sprite placement in screen pixels. `image` is `None` while the sprite is blinked off;
/// its cells still count so the background gets repainted over it.
#[derive(Debug, Clone)]
pub(super) struct DrawnSprite {
    x: i32,
    y: i32,
    image: Option<Rc<Bitmap>>,
    cells: Vec<Position>,
}

impl DrawnSprite {
    fn differs_from(&self, other: &DrawnSprite) -> bool {
        let same_image = match (&self.image, &other.image) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.x != other.x || self.y != other.y || !same_image
    }
}

/// Screen cells touched by `rect`, clipped to a `cols x rows` grid.
fn covered_cells(rect: PixelRect, size: i32, cols: i32, rows: i32) -> Vec<Position> {
    if rect.width == 0 || rect.height == 0 {
        return Vec::new();
    }
    let x0 = rect.x.div_euclid(size).max(0);
    let y0 = rect.y.div_euclid(size).max(0);
    let x1 = (rect.right() - 1).div_euclid(size).min(cols - 1);
    let y1 = (rect.bottom() - 1).div_euclid(size).min(rows - 1);
    let mut cells = Vec::new();
    for y in y0..=y1 {
        for x in x0..=x1 {
            cells.push(Position::new(x, y));
        }
    }
    cells
}

impl Controller {
    /// Incremental redraw. Only cells whose content changed, cells flagged dirty and cells
    /// uncovered by a moving sprite are repainted unless the viewport scrolled or a full
    /// redraw was forced.
    pub(super) fn draw(&mut self, target: &mut dyn RenderTarget) -> FrameStats {
        let origin = (self.scene.left(), self.scene.top());
        let full = self.force_redraw || self.last_origin != Some(origin);
        let sprites = self.place_sprites();

        if !full {
            for (key, sprite) in &sprites {
                if let Some(previous) = self.drawn_sprites.get(key) {
                    if previous.differs_from(sprite) {
                        self.dirty_tiles.extend(previous.cells.iter().copied());
                    }
                }
            }
            let live: HashSet<SpriteKey> = sprites.iter().map(|(key, _)| *key).collect();
            for (key, previous) in &self.drawn_sprites {
                if !live.contains(key) {
                    self.dirty_tiles.extend(previous.cells.iter().copied());
                }
            }
        }

        let mut touched = if self.scene.overlay().is_some() {
            self.draw_overlay_background(target, full)
        } else {
            self.draw_block_background(target, full)
        };
        let tiles_drawn = touched.len();
        self.dirty_tiles.clear();
        self.last_origin = Some(origin);
        self.force_redraw = false;

        let mut sprites_drawn = 0;
        let mut memo = HashMap::with_capacity(sprites.len());
        for (key, sprite) in sprites {
            let changed = self
                .drawn_sprites
                .get(&key)
                .map_or(true, |previous| previous.differs_from(&sprite));
            let exposed = sprite.cells.iter().any(|cell| touched.contains(cell));
            if full || changed || exposed {
                if let Some(image) = &sprite.image {
                    target.blit(image, sprite.x, sprite.y);
                    sprites_drawn += 1;
                    touched.extend(sprite.cells.iter().copied());
                }
            }
            memo.insert(key, sprite);
        }
        self.drawn_sprites = memo;

        if full {
            debug!(
                scene = self.scene.name(),
                left = origin.0,
                top = origin.1,
                "full_redraw"
            );
        }
        FrameStats {
            tiles_drawn,
            sprites_drawn,
            full_redraw: full,
        }
    }

    /// Actors first, then text blobs, each with the cells it covers this frame.
    fn place_sprites(&mut self) -> Vec<(SpriteKey, DrawnSprite)> {
        let size = self.scene.blocksize() as i32;
        let (cols, rows) = self.viewport_cells();
        let origin_x = self.scene.left() * size;
        let origin_y = self.scene.top() * size;
        let screen = PixelRect::new(0, 0, self.screen.0, self.screen.1);
        let mut sprites = Vec::new();

        for actor in &self.actors {
            let (x, y) = actor.body.draw_offset(size as u32);
            let (x, y) = (x - origin_x, y - origin_y);
            let (width, height) = actor
                .body
                .image
                .as_ref()
                .map_or((size as u32, size as u32), |image| image.size());
            let rect = PixelRect::new(x, y, width, height);
            if !rect.overlaps(&screen) {
                continue;
            }
            sprites.push((
                SpriteKey::Actor(actor.id()),
                DrawnSprite {
                    x,
                    y,
                    image: actor.body.image.clone(),
                    cells: covered_cells(rect, size, cols, rows),
                },
            ));
        }

        for blob in &mut self.blobs {
            let owner = blob.id().owner;
            let anchor = match self.actors.iter().find(|actor| actor.id() == owner) {
                Some(actor) => actor.body.draw_offset(size as u32),
                None => match self.scene.tile_object(owner) {
                    Some(tile) => (tile.pos().x * size, tile.pos().y * size),
                    None => continue,
                },
            };
            let owner_rect =
                PixelRect::new(anchor.0 - origin_x, anchor.1 - origin_y, size as u32, size as u32);
            if !owner_rect.overlaps(&screen) {
                continue;
            }
            let image = blob.render();
            let x = owner_rect.x + size / 2;
            let y = owner_rect.y + size;
            let rect = PixelRect::new(x, y, image.width(), image.height());
            sprites.push((
                SpriteKey::Blob(blob.id()),
                DrawnSprite {
                    x,
                    y,
                    image: Some(image),
                    cells: covered_cells(rect, size, cols, rows),
                },
            ));
        }
        sprites
    }

    fn draw_block_background(
        &mut self,
        target: &mut dyn RenderTarget,
        full: bool,
    ) -> HashSet<Position> {
        let size = self.scene.blocksize();
        let (cols, rows) = self.viewport_cells();
        let out_of_map = self.scene.config().out_of_map;
        let mut redrawn = HashSet::new();

        for y in 0..rows {
            for x in 0..cols {
                let cell = Position::new(x, y);
                let map_pos = Position::new(self.scene.left() + x, self.scene.top() + y);
                let tile = match self.scene.content_at(map_pos) {
                    TileContent::Color(color) => DrawnTile::Color(color),
                    TileContent::StaticImage(image) => DrawnTile::Image(image),
                    TileContent::Entity(id) => self
                        .scene
                        .tile_object(id)
                        .and_then(|tile| tile.body.image.clone())
                        .map_or(DrawnTile::Color(out_of_map), DrawnTile::Image),
                };
                let unchanged = self.old_tiles.get(&cell) == Some(&tile);
                if !full && unchanged && !self.dirty_tiles.contains(&cell) {
                    continue;
                }

                let rect = PixelRect::new(x * size as i32, y * size as i32, size, size);
                match &tile {
                    DrawnTile::Color(color) => target.fill_rect(rect, *color),
                    DrawnTile::Image(image) => {
                        target.fill_rect(rect, out_of_map);
                        target.blit(image, rect.x, rect.y);
                    }
                }
                self.old_tiles.insert(cell, tile);
                redrawn.insert(cell);
            }
        }
        redrawn
    }

    fn draw_overlay_background(
        &mut self,
        target: &mut dyn RenderTarget,
        full: bool,
    ) -> HashSet<Position> {
        let size = self.scene.blocksize();
        let (cols, rows) = self.viewport_cells();
        let out_of_map = self.scene.config().out_of_map;
        let left_px = self.scene.left() * size as i32;
        let top_px = self.scene.top() * size as i32;
        let Some(overlay) = self.scene.overlay() else {
            return HashSet::new();
        };

        if full {
            // The overlay may be translucent, so clear before compositing it.
            let view = PixelRect::new(left_px, top_px, self.screen.0, self.screen.1);
            target.fill_rect(
                PixelRect::new(0, 0, self.screen.0, self.screen.1),
                out_of_map,
            );
            target.blit_region(overlay, 0, 0, view);
            let mut all = HashSet::new();
            for y in 0..rows {
                for x in 0..cols {
                    all.insert(Position::new(x, y));
                }
            }
            return all;
        }

        let mut redrawn = HashSet::new();
        for cell in &self.dirty_tiles {
            if !(0..cols).contains(&cell.x) || !(0..rows).contains(&cell.y) {
                continue;
            }
            let x = cell.x * size as i32;
            let y = cell.y * size as i32;
            let source = PixelRect::new(left_px + x, top_px + y, size, size);
            target.fill_rect(PixelRect::new(x, y, size, size), out_of_map);
            target.blit_region(overlay, x, y, source);
            redrawn.insert(*cell);
        }
        redrawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolating_sprite_covers_four_cells() {
        let cells = covered_cells(PixelRect::new(5, 5, 10, 10), 10, 8, 8);
        assert_eq!(
            cells,
            vec![
                Position::new(0, 0),
                Position::new(1, 0),
                Position::new(0, 1),
                Position::new(1, 1)
            ]
        );
    }

    #[test]
    fn covered_cells_are_clipped_to_the_screen() {
        let cells = covered_cells(PixelRect::new(-5, 75, 10, 10), 10, 8, 8);
        assert_eq!(cells, vec![Position::new(0, 7)]);
        assert!(covered_cells(PixelRect::new(0, 0, 0, 10), 10, 8, 8).is_empty());
    }

    #[test]
    fn blinked_off_sprites_differ_from_visible_ones() {
        let image = Rc::new(Bitmap::solid(1, 1, [1, 2, 3, 255]));
        let visible = DrawnSprite {
            x: 0,
            y: 0,
            image: Some(Rc::clone(&image)),
            cells: Vec::new(),
        };
        let hidden = DrawnSprite {
            image: None,
            ..visible.clone()
        };
        assert!(visible.differs_from(&hidden));
        assert!(!visible.differs_from(&visible.clone()));
    }
}
