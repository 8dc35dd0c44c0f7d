//! Kernel capability probing.
//!
//! Landlock first shipped in Linux 5.13. On older kernels the sandbox under
//! test is absent or partial, so integration failures there are expected.
//! The probe only produces advisory output; it never changes which phases run
//! or what exit code the pipeline returns.

use std::cmp::Ordering;
use std::fmt;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HarnessError, Result};

const OSRELEASE_PATH: &str = "/proc/sys/kernel/osrelease";

/// `major.minor` kernel version. Ordering is lexicographic on (major, minor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelVersion {
    pub major: u32,
    pub minor: u32,
}

impl KernelVersion {
    /// First kernel with Landlock ABI v1.
    pub const MIN_LANDLOCK: KernelVersion = KernelVersion::new(5, 13);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse the leading `major.minor` pair of a release string.
    ///
    /// Everything after the minor number is ignored, so `5.15.0-generic`,
    /// `6.1-rc2` and `5.13` all parse.
    pub fn parse(release: &str) -> Result<Self> {
        let malformed = || HarnessError::MalformedVersionString {
            input: release.to_string(),
        };

        let mut fields = release.trim().splitn(3, '.');
        let major_field = fields.next().ok_or_else(malformed)?;
        let minor_field = fields.next().ok_or_else(malformed)?;

        if major_field.is_empty() || !major_field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let minor_digits: &str = {
            let end = minor_field
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(minor_field.len());
            &minor_field[..end]
        };
        if minor_digits.is_empty() {
            return Err(malformed());
        }

        let major = major_field.parse().map_err(|_| malformed())?;
        let minor = minor_digits.parse().map_err(|_| malformed())?;
        Ok(Self { major, minor })
    }
}

impl Ord for KernelVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

impl PartialOrd for KernelVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl std::str::FromStr for KernelVersion {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// How well the host supports the feature under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTier {
    Full,
    Degraded,
}

impl CapabilityTier {
    pub fn classify(version: KernelVersion, minimum: KernelVersion) -> Self {
        if version < minimum {
            CapabilityTier::Degraded
        } else {
            CapabilityTier::Full
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CapabilityTier::Full => "full",
            CapabilityTier::Degraded => "degraded",
        }
    }
}

/// Result of probing the running kernel. Computed once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelProbe {
    /// Raw release string as reported by the OS.
    pub release: String,

    /// Parsed version, `None` when the release string was malformed.
    pub version: Option<KernelVersion>,

    /// Threshold the version was classified against.
    pub minimum: KernelVersion,

    /// `None` means the tier is unknown.
    pub tier: Option<CapabilityTier>,
}

impl KernelProbe {
    /// Classify a release string. Never fails.
    pub fn from_release(release: &str, minimum: KernelVersion) -> Self {
        let version = match KernelVersion::parse(release) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "kernel tier unknown");
                None
            }
        };
        Self {
            release: release.trim().to_string(),
            version,
            minimum,
            tier: version.map(|v| CapabilityTier::classify(v, minimum)),
        }
    }

    /// Probe the running kernel, preferring an explicit release override.
    pub fn detect(release_override: Option<&str>, minimum: KernelVersion) -> Self {
        let release = match release_override {
            Some(r) => r.to_string(),
            None => read_release().unwrap_or_else(|| "unknown".to_string()),
        };
        debug!(release = %release, "probed kernel release");
        Self::from_release(&release, minimum)
    }

    /// Tier name, or `"unknown"`.
    pub fn tier_name(&self) -> &'static str {
        self.tier.map(|t| t.name()).unwrap_or("unknown")
    }

    /// Advisory text for degraded or unknown hosts. `None` on a full host.
    pub fn advisory(&self) -> Option<String> {
        match (self.tier, self.version) {
            (Some(CapabilityTier::Full), _) => None,
            (Some(CapabilityTier::Degraded), Some(v)) => Some(format!(
                "Kernel {} is older than {}: Landlock is unavailable or partial. \
                 Integration test failures are expected and are not a regression.",
                v, self.minimum
            )),
            _ => Some(format!(
                "Kernel version unknown (release {:?}): cannot tell whether Landlock {}+ is available.",
                self.release, self.minimum
            )),
        }
    }
}

fn read_release() -> Option<String> {
    if let Ok(release) = std::fs::read_to_string(OSRELEASE_PATH) {
        return Some(release.trim().to_string());
    }
    let output = Command::new("uname").arg("-r").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let release = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!release.is_empty()).then_some(release)
}
