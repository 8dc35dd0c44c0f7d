//! Harness configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::gate::AnnotationStyle;
use crate::log::DEFAULT_LOG_FILE;
use crate::phase::{PhaseConfig, PhaseKind};
use crate::probe::KernelVersion;

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Shared result log written by the phases and read by the gate.
    pub log_path: PathBuf,

    pub unit: PhaseConfig,
    pub integration: PhaseConfig,

    /// Use this release string instead of probing the host.
    pub kernel_release: Option<String>,

    /// Kernels below this are classified as degraded.
    pub min_kernel: KernelVersion,

    /// Copy the log and a JSON summary here after the run.
    pub retain_dir: Option<PathBuf>,

    pub annotations: AnnotationStyle,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_FILE),
            unit: PhaseConfig::from_kind(PhaseKind::Unit),
            integration: PhaseConfig::from_kind(PhaseKind::Integration),
            kernel_release: None,
            min_kernel: KernelVersion::MIN_LANDLOCK,
            retain_dir: None,
            annotations: AnnotationStyle::default(),
        }
    }
}

impl HarnessConfig {
    pub fn with_log_path(mut self, log_path: impl Into<PathBuf>) -> Self {
        self.log_path = log_path.into();
        self
    }

    pub fn with_phases(mut self, unit: PhaseConfig, integration: PhaseConfig) -> Self {
        self.unit = unit;
        self.integration = integration;
        self
    }

    pub fn with_kernel_release(mut self, release: impl Into<String>) -> Self {
        self.kernel_release = Some(release.into());
        self
    }

    pub fn with_retain_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.retain_dir = Some(dir.into());
        self
    }

    pub fn with_annotations(mut self, style: AnnotationStyle) -> Self {
        self.annotations = style;
        self
    }

    /// Phases in execution order.
    pub fn phases(&self) -> [&PhaseConfig; 2] {
        [&self.unit, &self.integration]
    }
}
