//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the omniwave.toml file.
//! It provides defaults for the wave parameters, the locations of the four
//! dataset files, and the output format. Command-line arguments override
//! anything set here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::datasets::{WaveType, SET_COUNT};
use crate::params::{
    DEFAULT_DAYS_AFTER, DEFAULT_DAYS_BEFORE, DEFAULT_SCALE_FACTOR, DEFAULT_STEP_MINUTES,
};
use crate::renderer::{PointFormat, DEFAULT_PRECISION};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "omniwave.toml";

/// Application configuration loaded from omniwave.toml
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Wave parameter defaults
    pub wave: WaveConfig,
    /// Dataset file locations
    pub datasets: DatasetConfig,
    /// Point output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Default inputs for a wave run
#[derive(Debug, Deserialize, Serialize)]
pub struct WaveConfig {
    /// Days before the target at which generation starts
    pub days_before: f64,
    /// Days after the target (stored, not yet used by generation)
    pub days_after: f64,
    /// Step between points in minutes
    pub step_minutes: f64,
    /// Scale factor, 2 - 10,000
    pub scale_factor: i64,
    /// When set, `days_before` is derived from this date instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
}

/// Paths of the four dataset blobs
#[derive(Debug, Deserialize, Serialize)]
pub struct DatasetConfig {
    pub kelley: PathBuf,
    pub watkins: PathBuf,
    pub sheliak: PathBuf,
    pub huangti: PathBuf,
}

/// How emitted points are written
#[derive(Debug, Deserialize, Serialize)]
pub struct OutputConfig {
    pub format: PointFormat,
    /// Fractional digits for text output
    pub precision: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            format: PointFormat::Text,
            precision: DEFAULT_PRECISION,
        }
    }
}

impl DatasetConfig {
    /// Conventional layout: `<dir>/<name>.txt` for each dataset.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let path = |wave: WaveType| dir.as_ref().join(format!("{}.txt", wave.name()));
        DatasetConfig {
            kelley: path(WaveType::Kelley),
            watkins: path(WaveType::Watkins),
            sheliak: path(WaveType::Sheliak),
            huangti: path(WaveType::HuangTi),
        }
    }

    /// Paths in table order.
    pub fn paths(&self) -> [&Path; SET_COUNT] {
        [
            self.kelley.as_path(),
            self.watkins.as_path(),
            self.sheliak.as_path(),
            self.huangti.as_path(),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            wave: WaveConfig {
                days_before: DEFAULT_DAYS_BEFORE,
                days_after: DEFAULT_DAYS_AFTER,
                step_minutes: DEFAULT_STEP_MINUTES,
                scale_factor: DEFAULT_SCALE_FACTOR,
                target_date: None,
            },
            datasets: DatasetConfig::in_dir("data"),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from omniwave.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), "invalid config file format: {}", e);
                    warn!("using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no config file found, using default configuration");
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }
}
