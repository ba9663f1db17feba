use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::analysis::correlation::MIN_OCCURRENCES;
use crate::analysis::patterns::MIN_RECORDS;
use crate::analysis::physiological::MIN_NOISE_FLOOR;
use crate::analysis::AnalysisConfig;
use crate::baseline::{BaselineConfig, MIN_SAMPLES};
use crate::cache::CacheConfig;
use crate::load::LoadConfig;
use crate::logging::LogConfig;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// Capacity load calculation
    #[serde(default)]
    pub load: LoadConfig,

    /// Trend, correlation and pattern analysis
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Biometric cache TTLs
    #[serde(default)]
    pub cache: CacheConfig,

    /// Metric baselines
    #[serde(default)]
    pub baseline: BaselineConfig,

    /// Where events, samples and settings live
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub logging: LogConfig,

    /// Wall-clock limit on loading and recomputing baselines at startup
    #[serde(default = "default_bootstrap_timeout_secs")]
    pub bootstrap_timeout_secs: u64,
}

fn default_bootstrap_timeout_secs() -> u64 {
    10
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Data file locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Data directory; relative file names below resolve against it
    pub data_dir: PathBuf,

    /// Event log exported from the tracker (JSON)
    pub events_file: PathBuf,

    /// Biometric samples exported from the health platform (JSON)
    pub samples_file: PathBuf,

    /// Key-value settings holding persisted baselines (JSON)
    pub settings_file: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            data_dir: AppConfig::default_config_dir(),
            events_file: PathBuf::from("events.json"),
            samples_file: PathBuf::from("samples.json"),
            settings_file: PathBuf::from("settings.json"),
        }
    }
}

impl StorageSettings {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn events_path(&self) -> PathBuf {
        self.resolve(&self.events_file)
    }

    pub fn samples_path(&self) -> PathBuf {
        self.resolve(&self.samples_file)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.resolve(&self.settings_file)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            load: LoadConfig::default(),
            analysis: AnalysisConfig::default(),
            cache: CacheConfig::default(),
            baseline: BaselineConfig::default(),
            storage: StorageSettings::default(),
            logging: LogConfig::default(),
            bootstrap_timeout_secs: default_bootstrap_timeout_secs(),
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        debug!(path = %path.as_ref().display(), "Configuration saved");
        Ok(())
    }

    /// `~/.pacetrack`
    pub fn default_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pacetrack")
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(Self::default_config_path())
    }

    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }

        match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{:#}", e), "Invalid config file, using defaults");
                Self::default()
            }
        }
    }

    /// Save configuration to default location
    pub fn save_default(&mut self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to_file(config_path)
    }

    /// Reject values the calculators cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.load.half_life_days > 0.0) {
            anyhow::bail!("load.half_life_days must be positive");
        }

        let t = &self.load.thresholds;
        if !(0.0 <= t.caution && t.caution <= t.high && t.high <= t.critical) {
            anyhow::bail!("load.thresholds must satisfy 0 <= caution <= high <= critical");
        }

        if !(MIN_NOISE_FLOOR..=1.0).contains(&self.analysis.physiological_noise_floor) {
            anyhow::bail!("analysis.physiological_noise_floor must be within [{}, 1]", MIN_NOISE_FLOOR);
        }

        if self.analysis.min_correlation_occurrences < MIN_OCCURRENCES {
            anyhow::bail!("analysis.min_correlation_occurrences must be at least {}", MIN_OCCURRENCES);
        }

        if self.analysis.min_pattern_occurrences < MIN_RECORDS {
            anyhow::bail!("analysis.min_pattern_occurrences must be at least {}", MIN_RECORDS);
        }

        if self.baseline.lookback_days == 0 {
            anyhow::bail!("baseline.lookback_days must be at least 1");
        }

        if self.baseline.min_samples < MIN_SAMPLES {
            anyhow::bail!("baseline.min_samples must be at least {}", MIN_SAMPLES);
        }

        if self.analysis.utc_offset_minutes.abs() >= 24 * 60 || self.load.utc_offset_minutes.abs() >= 24 * 60 {
            anyhow::bail!("utc_offset_minutes must be within a day");
        }

        Ok(())
    }

    /// Point both calculators at the same time zone
    pub fn set_utc_offset_minutes(&mut self, minutes: i32) {
        self.load.utc_offset_minutes = minutes;
        self.analysis.utc_offset_minutes = minutes;
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }
}
