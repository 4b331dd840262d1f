use serde::Deserialize;
use serde_yaml::Value;

use crate::platform::domain::host::{HostInfo, OsKind};
use crate::shared::error::{PrivIdError, Result};

/// Published description of the native artifacts, per version and platform.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub metadata: ManifestMetadata,
    /// Nested `version -> OS -> ... -> [ArtifactEntry]`. Kept untyped because
    /// distribution versions such as `24.04` may be written as YAML numbers.
    #[serde(default)]
    versions: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default, alias = "s3_python_sdk_bucket")]
    pub s3_bucket: Option<String>,
    #[serde(default)]
    pub base_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactEntry {
    pub filename: String,
    pub sha256: String,
}

impl Manifest {
    pub fn parse(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// The artifact version to fetch: `metadata.latest`, else `fallback`.
    pub fn artifact_version<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.metadata
            .latest
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(fallback)
    }

    pub fn bucket<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.metadata
            .s3_bucket
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(fallback)
    }

    pub fn base_path(&self) -> &str {
        self.metadata.base_path.as_deref().unwrap_or("")
    }

    /// Files required on `host` for `version`.
    ///
    /// Darwin prefers the `universal` section and falls back to the
    /// architecture section. An absent or empty list is an error.
    pub fn artifacts_for(&self, version: &str, host: &HostInfo) -> Result<Vec<ArtifactEntry>> {
        let version_data = child(&self.versions, version).ok_or_else(|| {
            PrivIdError::load(format!("version {version} not found in manifest"))
        })?;
        let os_section = child(version_data, host.os().manifest_key());
        let arch = host.arch().as_str();

        let files = os_section.and_then(|section| match host.os() {
            OsKind::Linux => {
                let distro = host.distribution()?;
                let by_distro = child(section, &distro.id)?;
                child(child(by_distro, &distro.version_id)?, arch)
            }
            OsKind::Windows => child(section, arch),
            OsKind::Darwin => child(section, "universal")
                .filter(|files| !is_empty_list(files))
                .or_else(|| child(section, arch)),
        });

        let entries: Vec<ArtifactEntry> = match files {
            Some(node) => serde_yaml::from_value(node.clone()).map_err(|e| {
                PrivIdError::load_with(format!("invalid file list for {}", host.platform_tag()), e)
            })?,
            None => Vec::new(),
        };
        if entries.is_empty() {
            return Err(PrivIdError::load(format!(
                "no files found for {} in manifest version {version}",
                host.platform_tag()
            )));
        }
        Ok(entries)
    }
}

fn child<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    node.as_mapping()?
        .iter()
        .find(|(k, _)| key_matches(k, key))
        .map(|(_, v)| v)
}

fn key_matches(key: &Value, wanted: &str) -> bool {
    match key {
        Value::String(s) => s == wanted,
        Value::Number(n) => {
            n.to_string() == wanted
                || matches!((n.as_f64(), wanted.parse::<f64>()), (Some(a), Ok(b)) if a == b)
        }
        _ => false,
    }
}

fn is_empty_list(node: &Value) -> bool {
    node.as_sequence().map_or(true, |s| s.is_empty())
}
