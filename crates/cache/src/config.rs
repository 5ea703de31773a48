//! Texture cache configuration
//!
//! Settings can come from defaults, environment variables, or a TOML file,
//! and are validated before a cache is built from them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::estimate::MAX_TEXTURE_DIMENSION;
use crate::memory_budget::{MemoryBudget, DEFAULT_BUDGET_MB, DEFAULT_WARNING_THRESHOLD};

const ENV_BUDGET_MB: &str = "ORRERY_TEXTURE_BUDGET_MB";
const ENV_WARN_THRESHOLD: &str = "ORRERY_TEXTURE_WARN_THRESHOLD";
const ENV_MAX_TEXTURE_SIZE: &str = "ORRERY_MAX_TEXTURE_SIZE";

/// Configuration for a [`crate::GpuTextureCache`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Soft budget for estimated texture memory, in megabytes
    pub budget_mb: f64,
    /// Fraction of the budget above which the cache reports near-limit
    pub warning_threshold: f64,
    /// Resolution ceiling applied on top of the platform-reported maximum
    pub max_texture_dimension: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            budget_mb: DEFAULT_BUDGET_MB,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            max_texture_dimension: MAX_TEXTURE_DIMENSION,
        }
    }
}

impl CacheConfig {
    /// Sets the budget in megabytes.
    pub fn with_budget_mb(mut self, mb: f64) -> Self {
        self.budget_mb = mb;
        self
    }

    /// Sets the warning threshold as a fraction of the budget.
    pub fn with_warning_threshold(mut self, threshold: f64) -> Self {
        self.warning_threshold = threshold;
        self
    }

    /// Sets the resolution ceiling in pixels.
    pub fn with_max_texture_dimension(mut self, dimension: u32) -> Self {
        self.max_texture_dimension = dimension;
        self
    }

    /// The memory budget described by this configuration.
    pub fn memory_budget(&self) -> MemoryBudget {
        MemoryBudget::new(self.budget_mb).with_warning_threshold(self.warning_threshold)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.budget_mb.is_finite() || self.budget_mb <= 0.0 {
            return Err(ConfigError::invalid("budget_mb", self.budget_mb));
        }
        if !(self.warning_threshold > 0.0 && self.warning_threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "warning_threshold",
                self.warning_threshold,
            ));
        }
        if self.max_texture_dimension == 0 {
            return Err(ConfigError::invalid(
                "max_texture_dimension",
                self.max_texture_dimension,
            ));
        }
        Ok(())
    }

    /// Returns the default configuration file path for the current platform.
    ///
    /// - macOS: ~/Library/Application Support/orrery/texture-cache.toml
    /// - Linux: ~/.config/orrery/texture-cache.toml
    /// - Windows: %APPDATA%\orrery\texture-cache.toml
    pub fn default_config_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("orrery").join("texture-cache.toml")
        } else {
            PathBuf::from("texture-cache.toml")
        }
    }

    /// Loads configuration from environment variables on top of the defaults.
    ///
    /// Environment variables:
    /// - `ORRERY_TEXTURE_BUDGET_MB`: budget in MB (default: 300)
    /// - `ORRERY_TEXTURE_WARN_THRESHOLD`: warning fraction (default: 0.8)
    /// - `ORRERY_MAX_TEXTURE_SIZE`: resolution ceiling in pixels (default: 2048)
    ///
    /// # Errors
    /// Returns an error if any variable fails to parse or validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().merge_env()
    }

    /// Overrides fields with any environment variables that are set, then validates.
    ///
    /// # Errors
    /// Returns an error if any variable fails to parse or validate.
    pub fn merge_env(self) -> Result<Self, ConfigError> {
        let config = self.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields with any environment variables that are set.
    ///
    /// Values are parsed but not validated, so later layers can still
    /// replace them; call [`validate`](Self::validate) once all layers are in.
    ///
    /// # Errors
    /// Returns an error if a variable is set but does not parse.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(val) = std::env::var(ENV_BUDGET_MB) {
            self.budget_mb = val
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_BUDGET_MB, &val))?;
        }

        if let Ok(val) = std::env::var(ENV_WARN_THRESHOLD) {
            self.warning_threshold = val
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_WARN_THRESHOLD, &val))?;
        }

        if let Ok(val) = std::env::var(ENV_MAX_TEXTURE_SIZE) {
            self.max_texture_dimension = val
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_MAX_TEXTURE_SIZE, &val))?;
        }

        Ok(self)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format:
    /// ```toml
    /// budget_mb = 300.0
    /// warning_threshold = 0.8
    /// max_texture_dimension = 2048
    /// ```
    /// Missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_toml()?).map_err(io_err)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}
