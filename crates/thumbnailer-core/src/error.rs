//! Error types for the thumbnailer pipeline.
//!
//! Per-item errors ([`PipelineError`]) are captured into the run report and
//! never abort sibling work. Only [`ThumbnailerError`] escapes a run, and only
//! for fatal conditions such as an unwritable output directory.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::FailureKind;

/// Top-level error type for thumbnailer operations.
#[derive(Error, Debug)]
pub enum ThumbnailerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A required directory could not be created before the run started
    #[error("Cannot prepare directory {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stage worker panicked or was aborted
    #[error("{stage} worker failed: {message}")]
    Worker { stage: &'static str, message: String },

    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Per-item pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The URL could not be parsed or has no usable file name
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// Download failed
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Image decoding failed
    #[error("Decode error for {name}: {message}")]
    Decode { name: String, message: String },

    /// Image dimensions exceed limit
    #[error("Image too large: {name} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        name: String,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Resizing to one target width failed
    #[error("Resize to {width}px failed for {name}: {message}")]
    Resize {
        name: String,
        width: u32,
        message: String,
    },

    /// Encoding one target width failed
    #[error("Encode at {width}px failed for {name}: {message}")]
    Encode {
        name: String,
        width: u32,
        message: String,
    },

    /// Reading, writing or deleting a file failed
    #[error("Filesystem error at {path}: {message}")]
    Filesystem { path: PathBuf, message: String },
}

impl PipelineError {
    /// Map the error onto the failure category recorded in run reports.
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::InvalidUrl { .. } | PipelineError::Fetch { .. } => FailureKind::Fetch,
            PipelineError::Decode { .. } | PipelineError::ImageTooLarge { .. } => {
                FailureKind::Decode
            }
            PipelineError::Resize { .. } => FailureKind::Resize,
            PipelineError::Encode { .. } => FailureKind::Encode,
            PipelineError::Filesystem { .. } => FailureKind::Filesystem,
        }
    }

    /// Build a filesystem error from an I/O error at `path`.
    pub fn filesystem(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        PipelineError::Filesystem {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Convenience type alias for thumbnailer results.
pub type Result<T> = std::result::Result<T, ThumbnailerError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
