//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::PipelineMode;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Base directory holding the scratch and output folders
    pub home_dir: PathBuf,

    /// Scratch folder for in-flight downloads, relative to `home_dir`
    pub input_subdir: String,

    /// Folder for finished thumbnails, relative to `home_dir`
    pub output_subdir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            home_dir: PathBuf::from("."),
            input_subdir: "incoming".to_string(),
            output_subdir: "outgoing".to_string(),
        }
    }
}

/// Pipeline scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Streaming overlaps downloads with resizing; batch runs them back to back
    pub mode: PipelineMode,

    /// Number of concurrent download workers
    pub download_concurrency: usize,

    /// Number of concurrent resize workers
    pub resize_concurrency: usize,

    /// Max downloaded images buffered between stages in streaming mode
    pub buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Streaming,
            download_concurrency: 4,
            resize_concurrency: default_resize_concurrency(),
            buffer_size: 100,
        }
    }
}

/// One resize worker per available core.
pub fn default_resize_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Whole-request timeout for a single download in milliseconds
    pub fetch_timeout_ms: u64,

    /// TCP/TLS connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Maximum accepted download size in megabytes
    pub max_download_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            max_download_mb: 50,
            max_image_dimension: 10_000,
        }
    }
}

/// Report output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print the JSON run report
    pub pretty: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
