use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::artifacts::domain::manifest::{ArtifactEntry, Manifest};
use crate::artifacts::domain::object_store::ObjectStore;
use crate::platform::domain::host::{HostInfo, OsKind};
use crate::shared::config::EngineConfig;
use crate::shared::constants::{MANIFEST_FILENAME, QUARANTINE_ATTRIBUTE};
use crate::shared::error::{PrivIdError, Result};

/// Makes sure the native artifacts for a host are present and verified in
/// the versioned cache directory.
pub struct ArtifactFetcher {
    store: Arc<dyn ObjectStore>,
    config: EngineConfig,
}

impl ArtifactFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Read the manifest and ensure every file listed for `host` is in
    /// `cache_dir`. Returns the verified file paths in manifest order.
    pub fn ensure(&self, host: &HostInfo, cache_dir: &Path) -> Result<Vec<PathBuf>> {
        let manifest = self.read_manifest(cache_dir)?;
        let files = self.ensure_files(&manifest, host, cache_dir)?;
        if host.os() == OsKind::Darwin {
            strip_quarantine(cache_dir, host.os());
        }
        Ok(files)
    }

    /// Cached `manifest.yaml` if it parses, otherwise one fresh download.
    pub fn read_manifest(&self, cache_dir: &Path) -> Result<Manifest> {
        let path = cache_dir.join(MANIFEST_FILENAME);
        if path.exists() {
            match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| Manifest::parse(&text).map_err(|e| e.to_string()))
            {
                Ok(manifest) => return Ok(manifest),
                Err(e) => log::warn!(
                    "Cached manifest {} is unreadable ({e}), downloading it again",
                    path.display()
                ),
            }
        }

        let key = format!("{}/{MANIFEST_FILENAME}", self.config.package_version);
        download(self.store.as_ref(), &self.config.bucket, &key, &path)?;
        let text = fs::read_to_string(&path)
            .map_err(|e| PrivIdError::load_with("failed to read downloaded manifest", e))?;
        Manifest::parse(&text).map_err(|e| PrivIdError::load_with("failed to parse manifest", e))
    }

    /// Fails before any download when the manifest has nothing for `host`.
    pub fn ensure_files(
        &self,
        manifest: &Manifest,
        host: &HostInfo,
        cache_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let version = manifest.artifact_version(&self.config.package_version);
        let entries = manifest.artifacts_for(version, host)?;
        let bucket = manifest.bucket(&self.config.bucket);
        let tag = host.platform_tag();

        entries
            .iter()
            .map(|entry| {
                check_filename(entry)?;
                let dest = cache_dir.join(&entry.filename);
                if dest.exists() {
                    if let Err(e) = verify_checksum(&dest, &entry.sha256) {
                        // Never leave a corrupt file where the loader would pick it up.
                        let _ = fs::remove_file(&dest);
                        return Err(e);
                    }
                } else {
                    let key = tag.object_key(manifest.base_path(), version, &entry.filename);
                    download_verified(self.store.as_ref(), bucket, &key, &dest, &entry.sha256)?;
                }
                Ok(dest)
            })
            .collect()
    }
}

fn check_filename(entry: &ArtifactEntry) -> Result<()> {
    let name = entry.filename.as_str();
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\']);
    if plain {
        Ok(())
    } else {
        Err(PrivIdError::load(format!(
            "manifest lists an invalid filename `{name}`"
        )))
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Download to `<dest>.part` and rename into place; the `.part` file is
/// removed on failure.
fn download(store: &dyn ObjectStore, bucket: &str, key: &str, dest: &Path) -> Result<()> {
    download_verified_inner(store, bucket, key, dest, None)
}

fn download_verified(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    dest: &Path,
    sha256: &str,
) -> Result<()> {
    download_verified_inner(store, bucket, key, dest, Some(sha256))
}

fn download_verified_inner(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    dest: &Path,
    sha256: Option<&str>,
) -> Result<()> {
    let temp_path = part_path(dest);
    let result = store.fetch(bucket, key, &temp_path).and_then(|()| {
        if let Some(expected) = sha256 {
            verify_checksum(&temp_path, expected)?;
        }
        fs::rename(&temp_path, dest).map_err(|e| {
            PrivIdError::load_with(format!("failed to move into {}", dest.display()), e)
        })
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

pub fn sha256_hex(path: &Path) -> Result<String> {
    let read_err =
        |e: std::io::Error| PrivIdError::load_with(format!("failed to hash {}", path.display()), e);
    let mut file = fs::File::open(path).map_err(read_err)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(read_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Case-insensitive comparison against the manifest digest.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_hex(path)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(PrivIdError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Remove the download quarantine flag from every library in `dir`.
/// Failures are logged, never fatal.
fn strip_quarantine(dir: &Path, os: OsKind) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot list {} to strip quarantine: {e}", dir.display());
            return;
        }
    };
    for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
        let is_lib = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| os.is_library_file(n));
        if !is_lib {
            continue;
        }
        match Command::new("xattr")
            .args(["-d", QUARANTINE_ATTRIBUTE])
            .arg(&path)
            .output()
        {
            Ok(out) if !out.status.success() => {
                log::debug!("No quarantine attribute on {}", path.display());
            }
            Ok(_) => log::info!("Removed quarantine attribute from {}", path.display()),
            Err(e) => log::warn!(
                "Failed to remove quarantine attribute from {}: {e}",
                path.display()
            ),
        }
    }
}
