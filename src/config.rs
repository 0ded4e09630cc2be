//! Service configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub global: GlobalConfig,
    pub filter: FilterConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GlobalConfig {
    /// Parcel dataset root: one subdirectory per jurisdiction.
    pub data_dir: PathBuf,
    pub listen: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("shapefiles"),
            listen: "0.0.0.0:10000".to_string(),
        }
    }
}

/// Eligibility thresholds. The year bounds vary between deployments
/// (some jurisdictions run `cutoff_year = 2000` with `min_year = 0`),
/// so they are configuration, not constants.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FilterConfig {
    /// Exclusive upper bound on structure year.
    pub cutoff_year: i32,
    /// Optional exclusive lower bound on structure year.
    pub min_year: Option<i32>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            cutoff_year: 1995,
            min_year: None,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}
