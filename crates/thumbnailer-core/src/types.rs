//! Core data types for the thumbnailer pipeline.
//!
//! These types describe the work flowing between stages and the report a
//! finished run hands back to the caller.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Widths every downloaded image is resized to.
pub const TARGET_WIDTHS: [u32; 3] = [32, 64, 200];

/// A source URL waiting to be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Position of the URL in the caller's input list
    pub index: usize,
    /// The URL to fetch
    pub url: String,
}

/// A fully downloaded image sitting in the scratch directory.
///
/// Only constructed once the scratch file has been written and closed. The
/// value is moved into the resize stage; the resize worker that receives it
/// is responsible for deleting `scratch_path`.
#[derive(Debug)]
pub struct DownloadedImage {
    /// File name derived from the URL (e.g. `photo.jpg`)
    pub name: String,
    /// URL the bytes came from
    pub source_url: String,
    /// Location of the scratch copy
    pub scratch_path: PathBuf,
    /// Size of the scratch copy in bytes
    pub byte_len: u64,
}

impl DownloadedImage {
    /// Base name without extension (`photo` for `photo.jpg`).
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(0) | None => &self.name,
            Some(idx) => &self.name[..idx],
        }
    }

    /// Extension including the leading dot, or empty (`.jpg` for `photo.jpg`).
    pub fn extension(&self) -> &str {
        match self.name.rfind('.') {
            Some(0) | None => "",
            Some(idx) => &self.name[idx..],
        }
    }

    /// Output file name for one target width: `<stem>_<width><ext>`.
    pub fn artifact_name(&self, width: u32) -> String {
        format!("{}_{}{}", self.stem(), width, self.extension())
    }
}

/// One resized output image written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailArtifact {
    /// Name of the source image
    pub source_name: String,
    /// Width in pixels (one of [`TARGET_WIDTHS`])
    pub width: u32,
    /// Height in pixels, derived from the source aspect ratio
    pub height: u32,
    /// Where the artifact was written
    pub path: PathBuf,
}

/// Failure categories recorded per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    Decode,
    Resize,
    Encode,
    Filesystem,
    Cancelled,
    /// The per-image resize task panicked
    Panicked,
}

/// A single item that did not make it through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// URL (download stage) or image name (resize stage)
    pub subject: String,
    /// Target width, when the failure is specific to one width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    pub kind: FailureKind,
    pub message: String,
}

impl ItemFailure {
    pub fn new(subject: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            width: None,
            kind,
            message: message.into(),
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }
}

/// How the two stages are scheduled relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Resize workers consume downloads as soon as they arrive
    #[default]
    Streaming,
    /// Resizing starts only after every download has finished
    Batch,
}

impl std::fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineMode::Streaming => write!(f, "streaming"),
            PipelineMode::Batch => write!(f, "batch"),
        }
    }
}

/// Lifecycle of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Downloading,
    Resizing,
    Complete,
    Failed,
}

/// Terminal status of a run that was not aborted by a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every item was attempted
    Complete,
    /// The run was cancelled; unattempted items are reported as failures
    Cancelled,
}

/// Elapsed time per stage and for the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub download: Duration,
    pub resize: Duration,
    pub total: Duration,
}

/// Everything a finished run reports back to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Scheduling mode used for this run
    pub mode: PipelineMode,
    /// Number of URLs supplied
    pub urls: usize,
    pub status: RunStatus,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
    /// Images fetched and persisted to scratch storage
    pub images_downloaded: usize,
    /// Artifacts written to the output directory
    pub thumbnails_created: usize,
    pub artifacts: Vec<ThumbnailArtifact>,
    pub failures: Vec<ItemFailure>,
    pub timings: StageTimings,
}

impl RunReport {
    /// Count failures of one kind.
    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }

    /// True when at least one item failed.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloaded(name: &str) -> DownloadedImage {
        DownloadedImage {
            name: name.to_string(),
            source_url: format!("https://example.com/{name}"),
            scratch_path: PathBuf::from(name),
            byte_len: 0,
        }
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(downloaded("photo.jpg").artifact_name(32), "photo_32.jpg");
        assert_eq!(
            downloaded("archive.tar.png").artifact_name(200),
            "archive.tar_200.png"
        );
    }

    #[test]
    fn test_artifact_name_without_extension() {
        assert_eq!(downloaded("photo").artifact_name(64), "photo_64");
        assert_eq!(downloaded(".hidden").artifact_name(64), ".hidden_64");
    }

    #[test]
    fn test_failure_serialization() {
        let failure = ItemFailure::new("a.png", FailureKind::Resize, "bad").with_width(64);
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"kind\":\"resize\""));
        assert!(json.contains("\"width\":64"));

        let failure = ItemFailure::new("https://x/a.png", FailureKind::Fetch, "404");
        let json = serde_json::to_string(&failure).unwrap();
        assert!(!json.contains("width"));
    }

    #[test]
    fn test_default_mode_is_streaming() {
        assert_eq!(PipelineMode::default(), PipelineMode::Streaming);
        assert_eq!(PipelineMode::Batch.to_string(), "batch");
    }
}
