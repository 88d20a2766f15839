use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, warn};

use super::names::{validate_resource_name, ResourceNameError};

/// Ordered list of asset directories. Later entries take priority over earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push(&mut self, dir: impl Into<PathBuf>) {
        self.dirs.push(dir.into());
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Candidate locations in lookup order (highest priority first).
    pub fn candidates<'a>(&'a self, filename: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
        self.dirs.iter().rev().map(move |dir| dir.join(filename))
    }

    pub fn find(&self, filename: &str) -> Option<PathBuf> {
        self.candidates(filename).find(|path| path.is_file())
    }
}

#[derive(Debug, Error)]
pub enum ResourceLoadError {
    #[error("invalid resource name '{name}': {source}")]
    InvalidName {
        name: String,
        #[source]
        source: ResourceNameError,
    },
    #[error("resource '{name}' not found in {searched:?}")]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("failed to load '{path}': {reason}")]
    Load { path: PathBuf, reason: String },
}

/// How a failed load is resolved.
#[derive(Debug, Clone)]
pub struct LoadOptions<T> {
    /// Returned (and cached) when loading fails.
    pub default: Option<T>,
    /// Skip cached entries and load again.
    pub force: bool,
    /// Without a default, a failure becomes an error instead of `Ok(None)`.
    pub mandatory: bool,
}

impl<T> Default for LoadOptions<T> {
    fn default() -> Self {
        Self {
            default: None,
            force: false,
            mandatory: false,
        }
    }
}

impl<T> LoadOptions<T> {
    pub fn optional() -> Self {
        Self::default()
    }

    pub fn mandatory() -> Self {
        Self {
            mandatory: true,
            ..Self::default()
        }
    }

    pub fn with_default(mut self, default: T) -> Self {
        self.default = Some(default);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Lazily populated lookup keyed by resolved path. Entries are never evicted; failed loads are
/// remembered as well (as their default, or as `None`).
#[derive(Debug)]
pub struct ResourceCache<T> {
    entries: HashMap<PathBuf, Option<T>>,
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Clone> ResourceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&Option<T>> {
        self.entries.get(path)
    }

    pub fn load<F, E>(
        &mut self,
        name: &str,
        search: &SearchPath,
        options: LoadOptions<T>,
        loader: F,
    ) -> Result<Option<T>, ResourceLoadError>
    where
        F: FnOnce(&Path) -> Result<T, E>,
        E: Display,
    {
        if let Err(source) = validate_resource_name(name) {
            let err = ResourceLoadError::InvalidName {
                name: name.to_string(),
                source,
            };
            return resolve_failure(err, search, options);
        }

        let mut resolved = None;
        for candidate in search.candidates(name) {
            if !options.force {
                if let Some(cached) = self.entries.get(&candidate) {
                    debug!(path = %candidate.display(), "resource_cache_hit");
                    return Ok(cached.clone());
                }
            }
            if candidate.is_file() {
                resolved = Some(candidate);
                break;
            }
        }

        // Misses are cached under the lowest-priority candidate, like a load attempt there.
        let key = resolved.clone().unwrap_or_else(|| {
            search
                .dirs()
                .first()
                .map(|dir| dir.join(name))
                .unwrap_or_else(|| PathBuf::from(name))
        });

        let outcome = match resolved {
            Some(path) => {
                debug!(path = %path.display(), "resource_loading");
                loader(&path).map_err(|err| ResourceLoadError::Load {
                    path: path.clone(),
                    reason: err.to_string(),
                })
            }
            None => Err(ResourceLoadError::NotFound {
                name: name.to_string(),
                searched: search.dirs().to_vec(),
            }),
        };

        let value = match outcome {
            Ok(value) => Some(value),
            Err(err) => resolve_failure(err, search, options)?,
        };
        self.entries.insert(key, value.clone());
        Ok(value)
    }
}

/// Loads without caching, with the same failure policy as [`ResourceCache::load`].
pub fn load_resource<T, F, E>(
    name: &str,
    search: &SearchPath,
    options: LoadOptions<T>,
    loader: F,
) -> Result<Option<T>, ResourceLoadError>
where
    T: Clone,
    F: FnOnce(&Path) -> Result<T, E>,
    E: Display,
{
    ResourceCache::new().load(name, search, options, loader)
}

fn resolve_failure<T>(
    err: ResourceLoadError,
    search: &SearchPath,
    options: LoadOptions<T>,
) -> Result<Option<T>, ResourceLoadError> {
    match options.default {
        Some(default) => {
            log_failure(&err, search, options.mandatory);
            Ok(Some(default))
        }
        None if options.mandatory => {
            log_failure(&err, search, true);
            Err(err)
        }
        None => {
            log_failure(&err, search, false);
            Ok(None)
        }
    }
}

fn log_failure(err: &ResourceLoadError, search: &SearchPath, mandatory: bool) {
    if mandatory {
        error!(error = %err, search_path = ?search.dirs(), "resource_load_failed");
    } else if matches!(err, ResourceLoadError::NotFound { .. }) {
        debug!(error = %err, search_path = ?search.dirs(), "resource_not_found");
    } else {
        warn!(error = %err, search_path = ?search.dirs(), "resource_load_failed");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn read_text(path: &Path) -> Result<String, std::io::Error> {
        fs::read_to_string(path)
    }

    fn two_dir_search(temp: &TempDir) -> (PathBuf, PathBuf, SearchPath) {
        let low = temp.path().join("low");
        let high = temp.path().join("high");
        fs::create_dir_all(&low).expect("low dir");
        fs::create_dir_all(&high).expect("high dir");
        let search = SearchPath::new([low.clone(), high.clone()]);
        (low, high, search)
    }

    #[test]
    fn later_directories_take_priority() {
        let temp = TempDir::new().expect("tempdir");
        let (low, high, search) = two_dir_search(&temp);
        fs::write(low.join("a.txt"), "low").expect("write low");
        fs::write(high.join("a.txt"), "high").expect("write high");
        fs::write(low.join("b.txt"), "only low").expect("write b");

        let mut cache = ResourceCache::new();
        let a = cache
            .load("a.txt", &search, LoadOptions::optional(), read_text)
            .expect("load a");
        let b = cache
            .load("b.txt", &search, LoadOptions::optional(), read_text)
            .expect("load b");
        assert_eq!(a.as_deref(), Some("high"));
        assert_eq!(b.as_deref(), Some("only low"));
    }

    #[test]
    fn cached_value_is_reused_until_forced() {
        let temp = TempDir::new().expect("tempdir");
        let (low, _high, search) = two_dir_search(&temp);
        fs::write(low.join("a.txt"), "first").expect("write");
        let loads = Cell::new(0);
        let counting = |path: &Path| {
            loads.set(loads.get() + 1);
            read_text(path)
        };

        let mut cache = ResourceCache::new();
        cache
            .load("a.txt", &search, LoadOptions::optional(), counting)
            .expect("first");
        fs::write(low.join("a.txt"), "second").expect("rewrite");
        let cached = cache
            .load("a.txt", &search, LoadOptions::optional(), counting)
            .expect("cached");
        assert_eq!(cached.as_deref(), Some("first"));
        assert_eq!(loads.get(), 1);

        let forced = cache
            .load("a.txt", &search, LoadOptions::optional().forced(), counting)
            .expect("forced");
        assert_eq!(forced.as_deref(), Some("second"));
        assert_eq!(loads.get(), 2);
    }

    #[test]
    fn failure_returns_default_and_caches_it() {
        let temp = TempDir::new().expect("tempdir");
        let (_low, _high, search) = two_dir_search(&temp);
        let mut cache = ResourceCache::new();

        let value = cache
            .load(
                "missing.txt",
                &search,
                LoadOptions::optional().with_default("fallback".to_string()),
                read_text,
            )
            .expect("default");
        assert_eq!(value.as_deref(), Some("fallback"));
        assert_eq!(cache.len(), 1);

        let again = cache
            .load("missing.txt", &search, LoadOptions::optional(), read_text)
            .expect("cached default");
        assert_eq!(again.as_deref(), Some("fallback"));
    }

    #[test]
    fn optional_failure_without_default_is_none() {
        let search = SearchPath::default();
        let value = load_resource("missing.txt", &search, LoadOptions::optional(), read_text)
            .expect("optional");
        assert_eq!(value, None);
    }

    #[test]
    fn mandatory_failure_without_default_is_an_error() {
        let temp = TempDir::new().expect("tempdir");
        let (_low, _high, search) = two_dir_search(&temp);
        let err = load_resource::<String, _, _>(
            "missing.txt",
            &search,
            LoadOptions::mandatory(),
            read_text,
        )
        .expect_err("mandatory");
        assert!(matches!(err, ResourceLoadError::NotFound { .. }));
    }

    #[test]
    fn loader_errors_carry_the_attempted_path() {
        let temp = TempDir::new().expect("tempdir");
        let (low, _high, search) = two_dir_search(&temp);
        fs::write(low.join("bad.txt"), "x").expect("write");
        let err = load_resource::<String, _, _>("bad.txt", &search, LoadOptions::mandatory(), |_| {
            Err::<String, _>("corrupt")
        })
        .expect_err("corrupt");
        match err {
            ResourceLoadError::Load { path, reason } => {
                assert_eq!(path, low.join("bad.txt"));
                assert_eq!(reason, "corrupt");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn traversal_names_are_rejected() {
        let search = SearchPath::new(["."]);
        let err = load_resource::<String, _, _>(
            "../secret.txt",
            &search,
            LoadOptions::mandatory(),
            read_text,
        )
        .expect_err("traversal");
        assert!(matches!(err, ResourceLoadError::InvalidName { .. }));
    }
}
