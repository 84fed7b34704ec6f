//! Process-wide configuration and the `Setting` key/value facade.
//!
//! Two distinct layers live here, mirroring the split the pipeline draws between ambient
//! process configuration and the per-profile `Setting` entity:
//!
//! - [`RuntimeConfig`] — file-backed, process-wide knobs that are not part of any profile
//!   (log level, data directory, background poll interval, the response separator).
//! - [`Settings`] — a typed facade over the [`SettingsStore`] collaborator trait, parsing
//!   the enumerated string-typed `Setting` keys the pipeline reads every turn.

pub mod cancel;
pub mod error;
pub mod settings;

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use cancel::{CancelSource, CancelToken};
pub use error::PipelineError;
pub use settings::{InMemorySettingsStore, Settings, SettingsStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base `k` used when searching a semantic collection; Quote/VoiceSample types
    /// multiply this by `quote_search_k_factor` instead.
    pub semantic_search_k_base: usize,
    pub quote_search_k_factor: usize,
    /// Poll interval for the background turn-stripper worker when its queue is empty.
    pub strip_poll_interval_ms: u64,
    /// Literal marker appended to the model's expected output; text after it is kept in
    /// `strippedTurn`/`response` but hidden from `displayResponse`.
    pub response_separator: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            semantic_search_k_base: 20,
            quote_search_k_factor: 5,
            strip_poll_interval_ms: 250,
            response_separator: "\n---\n".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
    pub data_dir: String,
}

impl RuntimeConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(value) = env::var("LOOM_LOG_LEVEL") {
            if !value.is_empty() {
                config.telemetry.log_level = value;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_quotas() {
        let config = RuntimeConfig::default();
        assert_eq!(config.pipeline.semantic_search_k_base, 20);
        assert_eq!(config.pipeline.response_separator, "\n---\n");
    }

    #[test]
    fn round_trips_through_toml() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("runtime.toml");

        let mut config = RuntimeConfig::default();
        config.telemetry.log_level = "debug".to_string();
        config.save_to(&path)?;

        let loaded = RuntimeConfig::load_from(&path)?;
        assert_eq!(loaded.telemetry.log_level, "debug");
        Ok(())
    }

    #[test]
    fn missing_file_falls_back_to_default() -> Result<()> {
        let loaded = RuntimeConfig::load_from("/nonexistent/path/runtime.toml")?;
        assert_eq!(loaded.pipeline.semantic_search_k_base, 20);
        Ok(())
    }
}
