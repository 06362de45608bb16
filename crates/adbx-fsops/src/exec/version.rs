//! Parsing of `adb version` output.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Oldest tool release the engine's command lines are written against.
pub const MIN_ADB_VERSION: AdbVersion = AdbVersion::new(1, 0, 41);

/// Release of the device tool, as printed on its first `version` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AdbVersion {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component.
    pub patch: u32,
}

impl AdbVersion {
    /// Version `major.minor.patch`.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether this release is at least [`MIN_ADB_VERSION`].
    #[must_use]
    pub fn is_supported(self) -> bool {
        self >= MIN_ADB_VERSION
    }
}

impl fmt::Display for AdbVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Find `Android Debug Bridge version X.Y.Z` in `stdout`.
///
/// Missing components count as zero; anything unreadable yields `None`.
#[must_use]
pub fn parse_version(stdout: &str) -> Option<AdbVersion> {
    let raw = stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Android Debug Bridge version "))?;
    let mut parts = raw.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let mut component = || parts.next().map_or(Some(0), |part| part.parse::<u32>().ok());
    let minor = component()?;
    let patch = component()?;
    Some(AdbVersion::new(major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_the_bridge_version_line() {
        let stdout = "Android Debug Bridge version 1.0.41\n\
Version 35.0.2-12147458\n\
Installed as /opt/platform-tools/adb\n";
        let version = parse_version(stdout);
        assert_eq!(version, Some(AdbVersion::new(1, 0, 41)));
        assert!(version.is_some_and(AdbVersion::is_supported));
        assert_eq!(AdbVersion::new(1, 0, 41).to_string(), "1.0.41");
    }

    #[test]
    fn older_releases_are_not_supported() {
        let version = parse_version("Android Debug Bridge version 1.0.39\n");
        assert_eq!(version, Some(AdbVersion::new(1, 0, 39)));
        assert!(!AdbVersion::new(1, 0, 39).is_supported());
        assert!(AdbVersion::new(1, 1, 0).is_supported());
    }

    #[test]
    fn unreadable_output_has_no_version() {
        for stdout in ["", "adb: command not found", "Android Debug Bridge version x.y"] {
            assert_eq!(parse_version(stdout), None, "{stdout:?}");
        }
    }
}
