//! Engine configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EditError, EditResult};
use crate::export::output::OutputPathPolicy;
use crate::export::settings::ExportSettings;

/// Engine configuration, stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Where edited files are written.
    pub output: OutputPathPolicy,

    /// Preset and container passed to the exporter.
    pub export: ExportSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "vidtrim=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let (config, ignored) = Self::load_or_default(&config_file_path());
        if let Some(e) = ignored {
            tracing::warn!("Ignoring config: {}", e);
        }
        config
    }

    /// Load `path` if it exists. A file that cannot be used yields the defaults
    /// together with the error, so the caller can report it once logging is up.
    pub fn load_or_default(path: &Path) -> (Self, Option<EditError>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Load config from an explicit file.
    pub fn load_from(path: &Path) -> EditResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EditError::config(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| EditError::config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Write config as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> EditResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EditError::config(format!("failed to create {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| EditError::config(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| EditError::config(format!("failed to write {}: {e}", path.display())))
    }

    /// Standard config file location.
    pub fn default_path() -> PathBuf {
        config_file_path()
    }
}

fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("vidtrim").join("config.json")
}
