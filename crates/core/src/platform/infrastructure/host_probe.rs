use std::fs;
use std::process::Command;

use crate::platform::domain::host::{Architecture, HostInfo, LinuxDistribution, OsKind};
use crate::shared::error::Result;

const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Describe the running machine.
pub fn probe() -> Result<HostInfo> {
    let os = OsKind::from_name(std::env::consts::OS)?;
    let distribution = match os {
        OsKind::Linux => linux_distribution(),
        _ => None,
    };
    HostInfo::new(os, Architecture::from_machine(std::env::consts::ARCH), distribution)
}

/// `/etc/os-release` first, `lsb_release -a` when that yields no id.
fn linux_distribution() -> Option<LinuxDistribution> {
    match fs::read_to_string(OS_RELEASE_PATH) {
        Ok(text) => {
            if let Some(distro) = parse_os_release(&text) {
                return Some(distro);
            }
        }
        Err(e) => log::warn!("Failed to read {OS_RELEASE_PATH}: {e}"),
    }

    let output = Command::new("lsb_release").arg("-a").output();
    match output {
        Ok(out) => parse_lsb_release(&String::from_utf8_lossy(&out.stdout)),
        Err(e) => {
            log::debug!("lsb_release unavailable: {e}");
            None
        }
    }
}

pub(crate) fn parse_os_release(text: &str) -> Option<LinuxDistribution> {
    let mut id = String::new();
    let mut version_id = String::new();
    for line in text.lines() {
        let Some((key, value)) = line.trim_end().split_once('=') else {
            continue;
        };
        let value = value.trim_matches('"').trim_matches('\'');
        match key.to_ascii_lowercase().as_str() {
            "id" => id = value.to_string(),
            "version_id" => version_id = value.to_string(),
            _ => {}
        }
    }
    (!id.is_empty()).then(|| LinuxDistribution::new(id, version_id))
}

pub(crate) fn parse_lsb_release(text: &str) -> Option<LinuxDistribution> {
    let field = |name: &str| {
        text.lines()
            .find_map(|line| line.strip_prefix(name))
            .map(|rest| rest.trim_start_matches(':').trim().to_string())
    };
    let id = field("Distributor ID")?.to_ascii_lowercase();
    if id.is_empty() {
        return None;
    }
    Some(LinuxDistribution::new(id, field("Release").unwrap_or_default()))
}
