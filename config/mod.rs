//! Run configuration, stored as TOML.
//!
//! Every field has a default, so a file only needs the settings it changes and an
//! empty document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::data::TableSchema;
use crate::estimate::{BootstrapConfig, Execution};
use crate::models::ModelSpec;
use crate::percentile::PercentileMethod;
use crate::seeding::SeedSchedule;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading or writing the configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration from TOML format: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapSettings {
    pub rounds: usize,
    pub confidence_level: f64,
    pub target_floor: Option<f64>,
    pub percentile: PercentileMethod,
    /// Base seed; omitted means a fresh seed from system entropy.
    pub seed: Option<u64>,
    pub execution: Execution,
    /// Worker threads for parallel execution; omitted means one per logical CPU.
    pub threads: Option<usize>,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        let defaults = BootstrapConfig::default();
        Self {
            rounds: defaults.rounds,
            confidence_level: defaults.confidence_level,
            target_floor: defaults.target_floor,
            percentile: defaults.percentile,
            seed: None,
            execution: defaults.execution,
            threads: None,
        }
    }
}

impl BootstrapSettings {
    pub fn to_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            rounds: self.rounds,
            confidence_level: self.confidence_level,
            target_floor: self.target_floor,
            percentile: self.percentile,
            seeds: self.seed.map_or(SeedSchedule::Entropy, SeedSchedule::Fixed),
            execution: self.execution,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub bootstrap: BootstrapSettings,
    pub data: TableSchema,
    pub model: ModelSpec,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config = toml::from_str(&toml_string)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = self.to_toml_string()?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
