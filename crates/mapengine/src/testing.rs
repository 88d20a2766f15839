//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::app::rendering::{PixelRect, RenderTarget};
use crate::content::{Bitmap, Palette, ResourceLoadError, Rgba, SearchPath};
use crate::scene::{GameObjectRegistry, SceneConfig, SceneLoadError, SceneMap, ScenePlanes, SceneSource};

pub(crate) const RED: Rgba = [255, 0, 0, 255];
pub(crate) const GREEN: Rgba = [0, 255, 0, 255];
pub(crate) const BLUE: Rgba = [0, 0, 255, 255];
pub(crate) const CLEAR: Rgba = [0, 0, 0, 0];

pub(crate) const ROOM_PALETTE: &str = "GIMP Palette\nName: room\n#\n255 0 0 wall\n0 255 0 ground\n0 0 255 hero\n";

pub(crate) fn palette(entries: &[(Rgba, &str)]) -> Palette {
    let mut palette = Palette::default();
    for (color, name) in entries {
        palette.insert(*color, name);
    }
    palette
}

pub(crate) fn planes(
    name: &str,
    background: &[&[Rgba]],
    actors: Option<&[&[Rgba]]>,
    palette: Palette,
) -> ScenePlanes {
    ScenePlanes {
        name: name.to_string(),
        background: Bitmap::from_rows(background),
        actors: actors.map(Bitmap::from_rows),
        overlay: None,
        palette,
    }
}

pub(crate) fn write_png(path: &Path, bitmap: &Bitmap) {
    let image = image::RgbaImage::from_raw(bitmap.width(), bitmap.height(), bitmap.as_rgba().to_vec())
        .expect("bitmap buffer matches its size");
    image.save(path).expect("write png");
}

/// Scenes served from memory.
pub(crate) struct StaticScenes {
    registry: Rc<GameObjectRegistry>,
    scenes: HashMap<String, (ScenePlanes, SceneConfig)>,
}

impl StaticScenes {
    pub(crate) fn new(registry: GameObjectRegistry) -> Self {
        Self {
            registry: Rc::new(registry),
            scenes: HashMap::new(),
        }
    }

    pub(crate) fn with(mut self, planes: ScenePlanes, config: SceneConfig) -> Self {
        self.scenes.insert(planes.name.clone(), (planes, config));
        self
    }
}

impl SceneSource for StaticScenes {
    fn load(&self, name: &str) -> Result<SceneMap, SceneLoadError> {
        let Some((planes, config)) = self.scenes.get(name) else {
            return Err(SceneLoadError::Background {
                scene: name.to_string(),
                source: ResourceLoadError::NotFound {
                    name: format!("{name}.png"),
                    searched: Vec::new(),
                },
            });
        };
        Ok(SceneMap::from_parts(
            planes.clone(),
            config.clone(),
            SearchPath::default(),
            Rc::clone(&self.registry),
        ))
    }
}

/// Records every draw call instead of touching pixels.
#[derive(Debug, Default)]
pub(crate) struct RecordingTarget {
    width: u32,
    height: u32,
    pub fills: Vec<(PixelRect, Rgba)>,
    pub blits: Vec<(i32, i32, (u32, u32))>,
    pub regions: Vec<(i32, i32, PixelRect)>,
}

impl RecordingTarget {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub(crate) fn op_count(&self) -> usize {
        self.fills.len() + self.blits.len() + self.regions.len()
    }

    pub(crate) fn clear(&mut self) {
        self.fills.clear();
        self.blits.clear();
        self.regions.clear();
    }
}

impl RenderTarget for RecordingTarget {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Rgba) {
        self.fills.push((rect, color));
    }

    fn blit(&mut self, image: &Bitmap, x: i32, y: i32) {
        self.blits.push((x, y, image.size()));
    }

    fn blit_region(&mut self, _image: &Bitmap, x: i32, y: i32, source: PixelRect) {
        self.regions.push((x, y, source));
    }
}
