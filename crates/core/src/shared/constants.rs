pub const LIB_NAME: &str = "privid_fhe";

pub const PACKAGE_NAME: &str = "cryptonets_python_sdk";
pub const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BUCKET: &str = "cryptonets-python-sdk";
/// `{bucket}` and `{key}` are substituted per request.
pub const DEFAULT_BUCKET_ENDPOINT: &str = "https://{bucket}.s3.amazonaws.com/{key}";

pub const MANIFEST_FILENAME: &str = "manifest.yaml";
pub const MODELS_DIR_NAME: &str = "models";

/// Times `is_library_initialized` is polled after `initialize_lib`.
pub const READY_POLL_ATTEMPTS: u32 = 100;
pub const READY_POLL_INTERVAL_MS: u64 = 100;

pub const QUARANTINE_ATTRIBUTE: &str = "com.apple.quarantine";

pub const CACHE_DIR_ENV: &str = "PRIVID_CACHE_DIR";
pub const PACKAGE_VERSION_ENV: &str = "PRIVID_PACKAGE_VERSION";
pub const BUCKET_ENV: &str = "PRIVID_BUCKET";
pub const BUCKET_ENDPOINT_ENV: &str = "PRIVID_BUCKET_ENDPOINT";
pub const LOG_LEVEL_ENV: &str = "PRIVID_LOG_LEVEL";
pub const VIRTUAL_ENV_VARS: &[&str] = &["VIRTUAL_ENV", "CONDA_PREFIX"];
