use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PrivIdError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum PrivIdError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
    #[error("failed to bind native symbol `{symbol}`: {source}")]
    SymbolBinding {
        symbol: String,
        #[source]
        source: libloading::Error,
    },
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("expected at most one dependency library in {dir}, found {found:?}")]
    AmbiguousDependency { dir: PathBuf, found: Vec<String> },
    #[error("library load failed: {reason}")]
    LibraryLoad {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("engine is not initialized")]
    NotInitialized,
    #[error("session error: {0}")]
    Session(String),
    #[error("malformed engine response: {0}")]
    MalformedResponse(String),
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode configuration: {0}")]
    ConfigEncoding(#[source] serde_json::Error),
}

impl PrivIdError {
    pub(crate) fn load(reason: impl Into<String>) -> Self {
        Self::LibraryLoad {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn load_with(
        reason: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::LibraryLoad {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_library_load_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = PrivIdError::load_with("reading manifest", io);
        assert_eq!(err.to_string(), "library load failed: reading manifest");
        assert_eq!(err.source().unwrap().to_string(), "gone");
    }

    #[test]
    fn test_library_load_without_source() {
        let err = PrivIdError::load("no files for host");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_checksum_mismatch_names_both_digests() {
        let err = PrivIdError::ChecksumMismatch {
            path: PathBuf::from("/tmp/libprivid_fhe.so"),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("expected aa"));
        assert!(msg.contains("got bb"));
    }
}
