use std::path::Path;

use crate::shared::error::Result;

/// Anonymous read access to a bucket of published artifacts.
pub trait ObjectStore: Send + Sync {
    /// Write the object at `bucket`/`key` to `dest`, replacing any existing file.
    ///
    /// Failures are reported as `PrivIdError::LibraryLoad`.
    fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<()>;
}
