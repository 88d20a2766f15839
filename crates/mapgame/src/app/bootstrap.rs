use std::rc::Rc;

use mapengine::{
    resolve_app_paths, AppPaths, Controller, LoopConfig, SceneLoadError, SceneLoader,
    StartupError,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay;
use super::manifest::{load_manifest, GameManifest, ManifestError, MANIFEST_FILE};

const GODMODE_ENV_VAR: &str = "MAPGAME_GODMODE";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) controller: Controller,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("failed to load the initial scene: {0}")]
    InitialScene(#[from] SceneLoadError),
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Map Game Startup ===");

    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        assets_dir = %paths.assets_dir.display(),
        scenes_dir = %paths.scenes_dir.display(),
        "startup"
    );

    let manifest_path = paths.assets_dir.join(MANIFEST_FILE);
    let manifest = match load_manifest(&manifest_path)? {
        Some(manifest) => manifest,
        None => {
            info!(path = %manifest_path.display(), "manifest_missing_using_defaults");
            GameManifest::default()
        }
    };
    info!(
        initial_scene = %manifest.initial_scene,
        scene_overrides = manifest.scenes.len(),
        "manifest_loaded"
    );

    let controller = build_controller(&paths, &manifest)?;
    let config = LoopConfig {
        window_title: manifest.title.clone(),
        godmode: manifest.godmode || godmode_from_env(),
        ..LoopConfig::default()
    };

    Ok(AppWiring { config, controller })
}

pub(crate) fn build_controller(
    paths: &AppPaths,
    manifest: &GameManifest,
) -> Result<Controller, SceneLoadError> {
    let registry = Rc::new(gameplay::build_registry(manifest));
    let mut loader = SceneLoader::new(paths.search_path(), registry);
    if let Some(defaults) = &manifest.defaults {
        loader = loader.with_defaults(defaults.clone());
    }
    for (scene, config) in &manifest.scenes {
        loader = loader.with_config(scene.clone(), config.clone());
    }
    Controller::new(Box::new(loader), manifest.initial_scene.clone())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn godmode_from_env() -> bool {
    std::env::var(GODMODE_ENV_VAR)
        .map(|raw| parse_flag(&raw))
        .unwrap_or(false)
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
