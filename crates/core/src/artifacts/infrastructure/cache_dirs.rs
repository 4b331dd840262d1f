use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::config::EngineConfig;
use crate::shared::constants::{MODELS_DIR_NAME, VIRTUAL_ENV_VARS};
use crate::shared::error::{PrivIdError, Result};

/// Root of the artifact cache.
///
/// - `cache_root` from the config when set
/// - `<prefix>/cache/<package>` inside an active virtual environment
/// - `~/.<package>_cache` otherwise
pub fn cache_root(config: &EngineConfig) -> Result<PathBuf> {
    let prefix = VIRTUAL_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .find(|v| !v.is_empty())
        .map(PathBuf::from);
    resolve_cache_root(
        config.cache_root.as_deref(),
        prefix.as_deref(),
        dirs::home_dir().as_deref(),
        &config.package_name,
    )
}

fn resolve_cache_root(
    explicit: Option<&Path>,
    prefix: Option<&Path>,
    home: Option<&Path>,
    package: &str,
) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(prefix) = prefix {
        return Ok(prefix.join("cache").join(package));
    }
    home.map(|h| h.join(format!(".{package}_cache")))
        .ok_or_else(|| PrivIdError::load("could not determine cache directory"))
}

/// `<root>/<package_version>`, created if missing. Holds the manifest and
/// the engine libraries.
pub fn package_cache_dir(config: &EngineConfig) -> Result<PathBuf> {
    ensure_dir(cache_root(config)?.join(&config.package_version))
}

/// `<root>/models`, shared across package versions.
pub fn models_cache_dir(config: &EngineConfig) -> Result<PathBuf> {
    ensure_dir(cache_root(config)?.join(MODELS_DIR_NAME))
}

fn ensure_dir(dir: PathBuf) -> Result<PathBuf> {
    fs::create_dir_all(&dir).map_err(|e| {
        PrivIdError::load_with(format!("failed to create cache directory {}", dir.display()), e)
    })?;
    Ok(dir)
}
