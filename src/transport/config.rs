//! Run configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::tree::TreeConfig;
use crate::util::{Error, Result};

/// Russian roulette for low-weight photons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouletteConfig {
    /// Survival probability; survivors have their weight divided by it
    pub chance: f64,
}

impl Default for RouletteConfig {
    fn default() -> Self {
        Self { chance: 0.1 }
    }
}

/// Per-photon transport settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Photons at or below this weight stop (or go to roulette)
    pub weight_threshold: f64,
    pub roulette: Option<RouletteConfig>,
    /// Record every straight path segment
    pub log_segments: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            weight_threshold: 1e-4,
            roulette: None,
            log_segments: false,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.weight_threshold.is_finite() || self.weight_threshold < 0.0 {
            return Err(Error::invalid(format!(
                "weight_threshold must be finite and non-negative, got {}",
                self.weight_threshold
            )));
        }
        if let Some(r) = self.roulette {
            if !(r.chance > 0.0 && r.chance <= 1.0) {
                return Err(Error::invalid(format!("roulette chance {} outside (0, 1]", r.chance)));
            }
        }
        Ok(())
    }
}

/// Settings of a bulk run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub seed: u64,
    /// Spread photons over the rayon pool
    pub parallel: bool,
    pub transport: TransportConfig,
    /// Partition parameters; `None` uses the brute-force finder
    pub tree: Option<TreeConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            parallel: true,
            transport: TransportConfig::default(),
            tree: Some(TreeConfig::default()),
        }
    }
}

impl RunConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading run config");
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.transport.validate()?;
        if let Some(tree) = &self.tree {
            tree.validate()?;
        }
        Ok(())
    }
}
