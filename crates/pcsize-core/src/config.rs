use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// Top-level configuration, loaded from pcsize.toml.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PcsizeConfig {
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Pipeline pool entries are rounded up to this many bytes (power of two)
    #[serde(default = "default_pool_entry_alignment")]
    pub pool_entry_alignment: u64,
    /// Smallest pool entry handed out, in bytes
    #[serde(default = "default_min_pool_entry_size")]
    pub min_pool_entry_size: u64,
    /// Extra margin added to every count and byte total, in percent
    #[serde(default)]
    pub headroom_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// LZ4-compress envelope files when it makes them smaller
    #[serde(default = "default_true")]
    pub compress: bool,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            pool_entry_alignment: default_pool_entry_alignment(),
            min_pool_entry_size: default_min_pool_entry_size(),
            headroom_percent: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            compress: default_true(),
        }
    }
}

impl SizingConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if !self.pool_entry_alignment.is_power_of_two() {
            return Err(CoreError::ConfigError(format!(
                "sizing.pool_entry_alignment must be a power of two, got {}",
                self.pool_entry_alignment
            )));
        }
        Ok(())
    }
}

impl PcsizeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PcsizeConfig =
            toml::from_str(&content).map_err(|e| CoreError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file if it exists, otherwise return defaults.
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(CoreError::Io(_)) => Self::default(),
            Err(e) => {
                warn!("ignoring {}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        self.sizing.validate()
    }
}

/// Returns the default config file path.
/// Search order:
/// 1. System-wide config: `/etc/pcsize/pcsize.toml`
/// 2. Local fallback: `./pcsize.toml`
pub fn default_config_path() -> String {
    let system_path = "/etc/pcsize/pcsize.toml";
    if std::path::Path::new(system_path).exists() {
        return system_path.to_string();
    }
    "pcsize.toml".to_string()
}

fn default_pool_entry_alignment() -> u64 {
    256
}

fn default_min_pool_entry_size() -> u64 {
    4096
}

fn default_true() -> bool {
    true
}
