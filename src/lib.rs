// Library interface for pacetrack
// Integration tests and the CLI binary both go through this crate root

pub mod analysis;
pub mod baseline;
pub mod biometrics;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod contributor;
pub mod error;
pub mod load;
pub mod logging;
pub mod models;
pub mod store;

// Re-export commonly used types for convenience
pub use models::*;
pub use analysis::{AnalysisConfig, AnalysisEngine, AnalysisReport, AnalysisWindow};
pub use baseline::{Baseline, BaselineCalculator, BaselineStore, SettingsStore};
pub use biometrics::BiometricSource;
pub use bootstrap::{BootstrapStatus, Pacetrack};
pub use cache::{CacheConfig, CacheMetrics, MetricCache};
pub use config::AppConfig;
pub use contributor::{Contributor, LoadContributor};
pub use error::{PacetrackError, Result};
pub use load::{FeltLoad, LoadCalculator, LoadConfig, LoadScore, RiskLevel};
pub use logging::{DiagnosticReport, LogConfig, LogFormat, LogLevel};
pub use store::EventStore;
