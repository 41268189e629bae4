//! Export settings passed through to the exporter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Quality preset token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    #[default]
    Highest,
    Medium,
    Low,
    /// Copy compressed streams without re-encoding
    Passthrough,
}

impl QualityPreset {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityPreset::Highest => "highest",
            QualityPreset::Medium => "medium",
            QualityPreset::Low => "low",
            QualityPreset::Passthrough => "passthrough",
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "highest" | "high" => Ok(QualityPreset::Highest),
            "medium" => Ok(QualityPreset::Medium),
            "low" => Ok(QualityPreset::Low),
            "passthrough" | "copy" => Ok(QualityPreset::Passthrough),
            other => Err(format!("unknown quality preset: {other}")),
        }
    }
}

/// Output container token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    #[default]
    Mp4,
    Mov,
    M4v,
}

impl ContainerFormat {
    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mov => "mov",
            ContainerFormat::M4v => "m4v",
        }
    }

    /// Muxer name understood by ffmpeg
    pub fn muxer(self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mov => "mov",
            ContainerFormat::M4v => "ipod",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ContainerFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp4" => Ok(ContainerFormat::Mp4),
            "mov" => Ok(ContainerFormat::Mov),
            "m4v" => Ok(ContainerFormat::M4v),
            other => Err(format!("unsupported container: {other}")),
        }
    }
}

/// Export settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub preset: QualityPreset,
    pub container: ContainerFormat,
}
