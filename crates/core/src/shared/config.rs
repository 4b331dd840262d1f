use std::path::PathBuf;

use crate::engine::engine_handle::LogLevel;
use crate::shared::constants::{
    BUCKET_ENDPOINT_ENV, BUCKET_ENV, CACHE_DIR_ENV, DEFAULT_BUCKET, DEFAULT_BUCKET_ENDPOINT,
    LOG_LEVEL_ENV, PACKAGE_NAME, PACKAGE_VERSION, PACKAGE_VERSION_ENV,
};

/// Where the engine artifacts come from and where they are cached.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub package_name: String,
    /// Selects `<version>/manifest.yaml` and the versioned cache folder.
    pub package_version: String,
    /// Fallback when the manifest does not name a bucket.
    pub bucket: String,
    pub bucket_endpoint: String,
    /// Overrides the computed cache root when set.
    pub cache_root: Option<PathBuf>,
    pub log_level: LogLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            package_name: PACKAGE_NAME.to_string(),
            package_version: PACKAGE_VERSION.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            bucket_endpoint: DEFAULT_BUCKET_ENDPOINT.to_string(),
            cache_root: None,
            log_level: LogLevel::Off,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with the `PRIVID_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty(CACHE_DIR_ENV) {
            config.cache_root = Some(PathBuf::from(dir));
        }
        if let Some(version) = non_empty(PACKAGE_VERSION_ENV) {
            config.package_version = version;
        }
        if let Some(bucket) = non_empty(BUCKET_ENV) {
            config.bucket = bucket;
        }
        if let Some(endpoint) = non_empty(BUCKET_ENDPOINT_ENV) {
            config.bucket_endpoint = endpoint;
        }
        if let Some(raw) = non_empty(LOG_LEVEL_ENV) {
            match raw.parse::<LogLevel>() {
                Ok(level) => config.log_level = level,
                Err(_) => log::warn!("Ignoring unrecognized {LOG_LEVEL_ENV}={raw}"),
            }
        }
        config
    }
}
