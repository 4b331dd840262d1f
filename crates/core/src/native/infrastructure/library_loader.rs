use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::artifacts::domain::object_store::ObjectStore;
use crate::artifacts::infrastructure::artifact_fetcher::ArtifactFetcher;
use crate::artifacts::infrastructure::cache_dirs;
use crate::artifacts::infrastructure::http_object_store::HttpObjectStore;
use crate::native::infrastructure::dynamic_library::NativeLibrary;
use crate::platform::domain::host::{HostInfo, OsKind};
use crate::platform::infrastructure::host_probe;
use crate::shared::config::EngineConfig;
use crate::shared::constants::LIB_NAME;
use crate::shared::error::{PrivIdError, Result};

/// A bound engine plus the directory it should keep its models in.
pub struct LoadedEngine {
    pub library: NativeLibrary,
    pub models_directory: PathBuf,
}

/// Produces a bound engine. The engine handle calls this once per
/// successful initialization.
pub trait LoadStrategy: Send + Sync {
    fn load(&self) -> Result<LoadedEngine>;
}

/// Fetch the artifacts for this host into the cache, then load them.
pub struct DefaultLoadStrategy {
    config: EngineConfig,
    store: Arc<dyn ObjectStore>,
    host: Option<HostInfo>,
}

impl DefaultLoadStrategy {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let store = HttpObjectStore::new(config.bucket_endpoint.clone())?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    pub fn with_store(config: EngineConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config,
            store,
            host: None,
        }
    }

    /// Use a fixed host description instead of probing the machine.
    pub fn with_host(mut self, host: HostInfo) -> Self {
        self.host = Some(host);
        self
    }
}

impl LoadStrategy for DefaultLoadStrategy {
    fn load(&self) -> Result<LoadedEngine> {
        let host = match &self.host {
            Some(host) => host.clone(),
            None => host_probe::probe()?,
        };
        log::info!("Resolving engine artifacts for {}", host.platform_tag());

        let cache_dir = cache_dirs::package_cache_dir(&self.config)?;
        ArtifactFetcher::new(self.store.clone(), self.config.clone()).ensure(&host, &cache_dir)?;
        let models_directory = cache_dirs::models_cache_dir(&self.config)?;

        let library = open_from_directory(&cache_dir, host.os())?;
        Ok(LoadedEngine {
            library,
            models_directory,
        })
    }
}

/// Load an engine already present in `directory`, without any download.
pub struct LocalLibraryStrategy {
    directory: PathBuf,
    models_directory: PathBuf,
}

impl LocalLibraryStrategy {
    pub fn new(directory: impl Into<PathBuf>, models_directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            models_directory: models_directory.into(),
        }
    }
}

impl LoadStrategy for LocalLibraryStrategy {
    fn load(&self) -> Result<LoadedEngine> {
        let os = OsKind::from_name(std::env::consts::OS)?;
        fs::create_dir_all(&self.models_directory).map_err(|e| {
            PrivIdError::load_with(
                format!("failed to create {}", self.models_directory.display()),
                e,
            )
        })?;
        Ok(LoadedEngine {
            library: open_from_directory(&self.directory, os)?,
            models_directory: self.models_directory.clone(),
        })
    }
}

fn open_from_directory(dir: &Path, os: OsKind) -> Result<NativeLibrary> {
    let (main, dependency) = resolve_library_paths(dir, os)?;
    NativeLibrary::open(&main, dependency.as_deref())
}

/// The engine library in `dir` and, if present, its single dependency.
///
/// Any other library file in the directory is the dependency; more than one
/// is `AmbiguousDependency`.
pub fn resolve_library_paths(dir: &Path, os: OsKind) -> Result<(PathBuf, Option<PathBuf>)> {
    let main_name = os.library_filename(LIB_NAME);
    let main = dir.join(&main_name);
    if !main.is_file() {
        return Err(PrivIdError::load(format!(
            "engine library {} not found",
            main.display()
        )));
    }

    let mut deps: Vec<String> = fs::read_dir(dir)
        .map_err(|e| PrivIdError::load_with(format!("failed to list {}", dir.display()), e))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| *name != main_name && os.is_library_file(name))
        .collect();
    deps.sort();

    match deps.len() {
        0 => Ok((main, None)),
        1 => {
            let dep = dir.join(&deps[0]);
            Ok((main, Some(dep)))
        }
        _ => Err(PrivIdError::AmbiguousDependency {
            dir: dir.to_path_buf(),
            found: deps,
        }),
    }
}
