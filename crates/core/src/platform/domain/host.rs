use std::fmt;

use crate::shared::error::{PrivIdError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OsKind {
    Windows,
    Darwin,
    Linux,
}

impl OsKind {
    /// Accepts both `uname`-style names and Rust's `std::env::consts::OS`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "windows" | "win32" => Ok(Self::Windows),
            "darwin" | "macos" => Ok(Self::Darwin),
            "linux" => Ok(Self::Linux),
            other => Err(PrivIdError::UnsupportedPlatform(format!(
                "operating system `{other}`"
            ))),
        }
    }

    /// Top-level key in the manifest and in object keys.
    pub fn manifest_key(self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::Darwin => "Darwin",
            Self::Linux => "Linux",
        }
    }

    pub fn library_extension(self) -> &'static str {
        match self {
            Self::Windows => "dll",
            Self::Darwin => "dylib",
            Self::Linux => "so",
        }
    }

    /// `privid_fhe.dll`, `libprivid_fhe.dylib` or `libprivid_fhe.so`.
    pub fn library_filename(self, lib_name: &str) -> String {
        match self {
            Self::Windows => format!("{lib_name}.dll"),
            Self::Darwin | Self::Linux => {
                format!("lib{lib_name}.{}", self.library_extension())
            }
        }
    }

    pub fn is_library_file(self, file_name: &str) -> bool {
        file_name
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| !stem.is_empty() && ext == self.library_extension())
    }
}

impl fmt::Display for OsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_key())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86_64,
    Arm64,
    Other(String),
}

impl Architecture {
    /// `amd64`/`x86_64` become `x86_64`; any `arm*`/`aarch*` becomes `arm64`.
    pub fn from_machine(machine: &str) -> Self {
        let machine = machine.trim().to_ascii_lowercase();
        if machine == "amd64" || machine == "x86_64" {
            Self::X86_64
        } else if machine.starts_with("arm") || machine.starts_with("aarch") {
            Self::Arm64
        } else {
            Self::Other(machine)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinuxDistribution {
    pub id: String,
    pub version_id: String,
}

impl LinuxDistribution {
    /// The id is lowercased; manifests key distributions in lowercase.
    pub fn new(id: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            id: id.into().to_ascii_lowercase(),
            version_id: version_id.into(),
        }
    }
}

/// The `<OS>/<platform>` pair that selects native artifacts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformTag {
    os: OsKind,
    platform: String,
}

impl PlatformTag {
    pub fn os(&self) -> OsKind {
        self.os
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// `{base_path}/{version}/{OS}/{platform}/{filename}`; an empty base path is skipped.
    pub fn object_key(&self, base_path: &str, version: &str, filename: &str) -> String {
        let base = base_path.trim_matches('/');
        let tail = format!("{version}/{}/{}/{filename}", self.os, self.platform);
        if base.is_empty() {
            tail
        } else {
            format!("{base}/{tail}")
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.platform)
    }
}

/// Normalized description of the machine the engine will run on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostInfo {
    os: OsKind,
    arch: Architecture,
    distribution: Option<LinuxDistribution>,
}

impl HostInfo {
    /// Linux hosts need a distribution id; other systems ignore it.
    pub fn new(
        os: OsKind,
        arch: Architecture,
        distribution: Option<LinuxDistribution>,
    ) -> Result<Self> {
        let distribution = match os {
            OsKind::Linux => match distribution {
                Some(d) if !d.id.trim().is_empty() => Some(d),
                _ => {
                    return Err(PrivIdError::UnsupportedPlatform(
                        "linux distribution could not be determined".into(),
                    ))
                }
            },
            _ => None,
        };
        Ok(Self {
            os,
            arch,
            distribution,
        })
    }

    pub fn resolve(
        os_name: &str,
        machine: &str,
        distribution: Option<LinuxDistribution>,
    ) -> Result<Self> {
        Self::new(
            OsKind::from_name(os_name)?,
            Architecture::from_machine(machine),
            distribution,
        )
    }

    pub fn os(&self) -> OsKind {
        self.os
    }

    pub fn arch(&self) -> &Architecture {
        &self.arch
    }

    pub fn distribution(&self) -> Option<&LinuxDistribution> {
        self.distribution.as_ref()
    }

    pub fn platform_tag(&self) -> PlatformTag {
        let platform = match (self.os, &self.distribution) {
            (OsKind::Linux, Some(d)) => format!("{}-{}-{}", d.id, d.version_id, self.arch),
            (OsKind::Darwin, _) => "universal".to_string(),
            _ => self.arch.to_string(),
        };
        PlatformTag {
            os: self.os,
            platform,
        }
    }

    pub fn library_filename(&self, lib_name: &str) -> String {
        self.os.library_filename(lib_name)
    }
}
