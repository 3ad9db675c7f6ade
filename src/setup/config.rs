use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::cpu::features::FeatureDetector;
use crate::cpu::leaf::LeafProbe;
use crate::cpu::platform::PlatformFeatures;
use crate::fpu::controller::{FpuController, ModeChange};
use crate::fpu::register::FpEnvironment;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Desired floating-point environment for math threads.
/// Missing fields fall back to the real-time defaults (everything on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FpuConfig {
    pub denormals_are_zero: bool,
    pub flush_to_zero: bool,
    pub extended_precision: bool,
}

impl Default for FpuConfig {
    fn default() -> Self {
        Self {
            denormals_are_zero: true,
            flush_to_zero: true,
            extended_precision: true,
        }
    }
}

/// Outcome of applying an [`FpuConfig`] to one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FpuReport {
    pub daz: ModeChange,
    pub ftz: ModeChange,
    /// `None` when precision was not requested.
    pub precision: Option<ModeChange>,
}

impl FpuConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Apply to the thread owning `env`. DAZ/FTZ are driven to the requested
    /// state either way; precision is only touched when requested.
    pub fn apply<P, S, E>(&self, detector: &FeatureDetector<P, S>, env: &mut E) -> FpuReport
    where
        P: LeafProbe,
        S: PlatformFeatures,
        E: FpEnvironment,
    {
        let controller = FpuController::new(detector);
        let daz = controller.set_daz(env, self.denormals_are_zero);
        let ftz = controller.set_ftz(env, self.flush_to_zero);
        let precision = self
            .extended_precision
            .then(|| controller.set_precision(env));
        FpuReport { daz, ftz, precision }
    }
}
