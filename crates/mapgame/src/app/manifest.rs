use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mapengine::SceneConfig;
use serde::Deserialize;
use thiserror::Error;

pub(crate) const MANIFEST_FILE: &str = "game.json";

/// `assets/game.json`: which scene to start in and per-scene options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameManifest {
    pub(crate) title: String,
    pub(crate) initial_scene: String,
    pub(crate) godmode: bool,
    /// Where portals lead. Falls back to the initial scene.
    pub(crate) portal_scene: Option<String>,
    /// Options for scenes without an entry in `scenes` or their own `<scene>.json`.
    pub(crate) defaults: Option<SceneConfig>,
    pub(crate) scenes: BTreeMap<String, SceneConfig>,
}

impl Default for GameManifest {
    fn default() -> Self {
        Self {
            title: "Map Game".to_string(),
            initial_scene: "room".to_string(),
            godmode: false,
            portal_scene: None,
            defaults: None,
            scenes: BTreeMap::new(),
        }
    }
}

impl GameManifest {
    pub(crate) fn portal_target(&self) -> &str {
        self.portal_scene.as_deref().unwrap_or(&self.initial_scene)
    }
}

#[derive(Debug, Error)]
pub(crate) enum ManifestError {
    #[error("failed to read game manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid game manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
    #[error("game manifest {path} names no initial scene")]
    MissingInitialScene { path: PathBuf },
}

/// Reads the manifest at `path`. A missing file yields the defaults.
pub(crate) fn load_manifest(path: &Path) -> Result<Option<GameManifest>, ManifestError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ManifestError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_manifest(&text, path).map(Some)
}

pub(crate) fn parse_manifest(text: &str, path: &Path) -> Result<GameManifest, ManifestError> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    let manifest: GameManifest =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
            ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
    if manifest.initial_scene.trim().is_empty() {
        return Err(ManifestError::MissingInitialScene {
            path: path.to_path_buf(),
        });
    }
    Ok(manifest)
}
