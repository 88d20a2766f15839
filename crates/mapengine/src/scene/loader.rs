use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;
use tracing::{info, warn};

use super::config::{DisplayType, SceneConfig};
use super::registry::GameObjectRegistry;
use super::scene_map::{SceneMap, ScenePlanes};
use crate::content::{load_resource, Bitmap, LoadOptions, Palette, ResourceLoadError, SearchPath};

#[derive(Debug, Error)]
pub enum SceneLoadError {
    #[error("scene '{scene}' has no usable background image: {source}")]
    Background {
        scene: String,
        #[source]
        source: ResourceLoadError,
    },
    #[error("scene '{scene}' has no usable palette: {source}")]
    Palette {
        scene: String,
        #[source]
        source: ResourceLoadError,
    },
    #[error("failed to read scene config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scene config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Produces scenes by name. The controller asks for one on start, on restart and whenever a
/// hook requests a scene swap.
pub trait SceneSource {
    fn load(&self, name: &str) -> Result<SceneMap, SceneLoadError>;
}

/// Loads `<name>.png`, `<name>_actors.png`, `<name>.gpl` and, in overlay mode,
/// `<name>_overlay.png` from a search path.
///
/// Scene options come from an explicit per-scene override, else from `<name>.json` on the
/// search path, else from the loader defaults.
#[derive(Debug, Clone)]
pub struct SceneLoader {
    search: SearchPath,
    registry: Rc<GameObjectRegistry>,
    configs: HashMap<String, SceneConfig>,
    defaults: SceneConfig,
}

impl SceneLoader {
    pub fn new(search: SearchPath, registry: Rc<GameObjectRegistry>) -> Self {
        Self {
            search,
            registry,
            configs: HashMap::new(),
            defaults: SceneConfig::default(),
        }
    }

    pub fn with_config(mut self, scene: impl Into<String>, config: SceneConfig) -> Self {
        self.configs.insert(scene.into(), config);
        self
    }

    pub fn with_defaults(mut self, config: SceneConfig) -> Self {
        self.defaults = config;
        self
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search
    }

    pub fn registry(&self) -> &Rc<GameObjectRegistry> {
        &self.registry
    }

    pub fn config_for(&self, scene: &str) -> Result<SceneConfig, SceneLoadError> {
        if let Some(config) = self.configs.get(scene) {
            return Ok(config.clone());
        }
        let Some(path) = self.search.find(&format!("{scene}.json")) else {
            return Ok(self.defaults.clone());
        };
        let text = fs::read_to_string(&path).map_err(|source| SceneLoadError::ConfigRead {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SceneLoadError::ConfigParse { path, source })
    }

    pub fn load_planes(
        &self,
        scene: &str,
        config: &SceneConfig,
    ) -> Result<ScenePlanes, SceneLoadError> {
        let background = load_resource(
            &format!("{scene}.png"),
            &self.search,
            LoadOptions::mandatory().forced(),
            |path| Bitmap::open(path),
        )
        .map_err(|source| SceneLoadError::Background {
            scene: scene.to_string(),
            source,
        })?
        .unwrap_or_else(|| Bitmap::solid(1, 1, config.out_of_map));

        let actors = self.optional_image(&format!("{scene}{}.png", config.actor_plane_suffix));
        if actors.is_none() {
            warn!(scene, "actor_plane_missing");
        }

        let palette = load_resource(
            &format!("{scene}.gpl"),
            &self.search,
            LoadOptions::mandatory(),
            |path| Palette::load(path),
        )
        .map_err(|source| SceneLoadError::Palette {
            scene: scene.to_string(),
            source,
        })?
        .unwrap_or_default();

        let overlay = match config.display_type {
            DisplayType::Overlay => {
                let overlay =
                    self.optional_image(&format!("{scene}{}.png", config.overlay_plane_suffix));
                if overlay.is_none() {
                    warn!(scene, "overlay_missing_using_blocks");
                }
                overlay
            }
            DisplayType::Block => None,
        };

        Ok(ScenePlanes {
            name: scene.to_string(),
            background,
            actors,
            overlay,
            palette,
        })
    }

    fn optional_image(&self, file: &str) -> Option<Bitmap> {
        load_resource(file, &self.search, LoadOptions::optional(), |path| {
            Bitmap::open(path)
        })
        .ok()
        .flatten()
    }
}

impl SceneSource for SceneLoader {
    fn load(&self, name: &str) -> Result<SceneMap, SceneLoadError> {
        let config = self.config_for(name)?;
        let planes = self.load_planes(name, &config)?;
        let (width, height) = planes.background.size();
        info!(
            scene = name,
            width,
            height,
            palette_colors = planes.palette.len(),
            display_type = ?config.display_type,
            "scene_planes_loaded"
        );
        Ok(SceneMap::from_parts(
            planes,
            config,
            self.search.clone(),
            Rc::clone(&self.registry),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;
    use crate::content::Rgba;
    use crate::scene::{ObjectClass, Position, TileContent};
    use crate::testing::{write_png, BLUE, GREEN, RED, ROOM_PALETTE};

    fn write_room(dir: &Path) {
        write_png(
            &dir.join("room.png"),
            &Bitmap::from_rows(&[&[RED, GREEN, GREEN]]),
        );
        let clear: Rgba = [0, 0, 0, 0];
        write_png(
            &dir.join("room_actors.png"),
            &Bitmap::from_rows(&[&[clear, clear, BLUE]]),
        );
        fs::write(dir.join("room.gpl"), ROOM_PALETTE).expect("write palette");
    }

    fn loader(dir: &Path) -> SceneLoader {
        let registry = GameObjectRegistry::new()
            .with(ObjectClass::tile("wall").with_hardness(10))
            .with(ObjectClass::actor("hero"));
        SceneLoader::new(SearchPath::new([dir]), Rc::new(registry))
    }

    #[test]
    fn loads_all_planes_from_the_search_path() {
        let dir = TempDir::new().expect("temp dir");
        write_room(dir.path());

        let mut scene = loader(dir.path()).load("room").expect("scene");
        assert_eq!((scene.width(), scene.height()), (3, 1));
        assert_eq!(scene.palette().len(), 3);
        assert!(matches!(
            scene.content_at(Position::new(0, 0)),
            TileContent::Entity(_)
        ));
        let spawns = scene.actor_spawns();
        assert_eq!(spawns.len(), 1);
        assert_eq!(spawns[0].0, Position::new(2, 0));
    }

    #[test]
    fn missing_background_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let err = loader(dir.path()).load("nowhere").expect_err("must fail");
        assert!(matches!(err, SceneLoadError::Background { .. }), "{err}");
    }

    #[test]
    fn missing_palette_is_an_error_but_missing_actors_are_not() {
        let dir = TempDir::new().expect("temp dir");
        write_png(&dir.path().join("bare.png"), &Bitmap::solid(2, 2, GREEN));
        let err = loader(dir.path()).load("bare").expect_err("must fail");
        assert!(matches!(err, SceneLoadError::Palette { .. }), "{err}");

        fs::write(dir.path().join("bare.gpl"), ROOM_PALETTE).expect("write palette");
        let mut scene = loader(dir.path()).load("bare").expect("scene");
        assert!(scene.actor_spawns().is_empty());
    }

    #[test]
    fn json_config_beside_the_scene_is_used() {
        let dir = TempDir::new().expect("temp dir");
        write_room(dir.path());
        fs::write(
            dir.path().join("room.json"),
            r#"{"window_width": 8, "scroll_rate": 2}"#,
        )
        .expect("write config");

        let scene = loader(dir.path()).load("room").expect("scene");
        assert_eq!(scene.config().window_width, 8);
        assert_eq!(scene.blocksize(), 100);
    }

    #[test]
    fn explicit_configs_override_files() {
        let dir = TempDir::new().expect("temp dir");
        write_room(dir.path());
        fs::write(dir.path().join("room.json"), "{ not json").expect("write config");

        let broken = loader(dir.path()).config_for("room");
        assert!(matches!(broken, Err(SceneLoadError::ConfigParse { .. })));

        let config = SceneConfig {
            margin: 0,
            ..SceneConfig::default()
        };
        let loader = loader(dir.path()).with_config("room", config);
        let scene = loader.load("room").expect("scene");
        assert_eq!(scene.config().h_margin(), 0);
    }

    #[test]
    fn later_search_directories_take_priority() {
        let base = TempDir::new().expect("base dir");
        let patch = TempDir::new().expect("patch dir");
        write_room(base.path());
        write_png(
            &patch.path().join("room.png"),
            &Bitmap::from_rows(&[&[GREEN, GREEN]]),
        );
        let registry = Rc::new(GameObjectRegistry::new());
        let loader = SceneLoader::new(SearchPath::new([base.path(), patch.path()]), registry);
        let scene = loader.load("room").expect("scene");
        assert_eq!(scene.width(), 2);
    }
}
