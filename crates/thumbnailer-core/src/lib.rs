//! Thumbnailer Core - download remote images and resize them to fixed widths.
//!
//! A run takes a list of image URLs and, for each one, writes thumbnails at
//! every width in [`TARGET_WIDTHS`] to an output directory, keeping the
//! aspect ratio of the source.
//!
//! # Architecture
//!
//! Two worker pools joined by a bounded channel:
//!
//! ```text
//! URLs → [download workers] → scratch dir → channel → [resize workers] → <name>_<width>.<ext>
//! ```
//!
//! Downloads are I/O bound and run as tokio tasks. Resizing is CPU bound and
//! runs on blocking threads. In streaming mode the two pools overlap; in batch
//! mode resizing starts once every download has finished.
//!
//! # Usage
//!
//! ```rust,ignore
//! use thumbnailer_core::{Config, Thumbnailer};
//!
//! #[tokio::main]
//! async fn main() -> thumbnailer_core::Result<()> {
//!     let thumbnailer = Thumbnailer::new(Config::load()?)?;
//!     let report = thumbnailer
//!         .make_thumbnails(vec!["https://example.com/cat.jpg".to_string()])
//!         .await?;
//!     println!("{} thumbnails", report.thumbnails_created);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, PipelineError, PipelineResult, Result, ThumbnailerError};
pub use output::{summarize, OutputWriter};
pub use pipeline::{Fetcher, HttpFetcher, ImageCodec, RasterCodec, ThumbnailPipeline};
pub use types::{
    DownloadedImage, FailureKind, ItemFailure, PipelineMode, PipelineState, RunReport, RunStatus,
    StageTimings, ThumbnailArtifact, TARGET_WIDTHS,
};

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Thumbnailer - the main entry point.
///
/// Builds the default HTTP fetcher and raster codec from configuration and
/// runs the pipeline with them.
pub struct Thumbnailer {
    config: Config,
    pipeline: ThumbnailPipeline,
}

impl Thumbnailer {
    /// Create a thumbnailer with the default HTTP fetcher and raster codec.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config.limits)?;
        let codec = RasterCodec::new(config.limits.clone());
        Ok(Self::with_collaborators(
            config,
            Arc::new(fetcher),
            Arc::new(codec),
        ))
    }

    /// Create a thumbnailer with caller-supplied fetch and codec implementations.
    pub fn with_collaborators(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        codec: Arc<dyn ImageCodec>,
    ) -> Self {
        tracing::debug!("Initializing thumbnailer v{}", VERSION);
        let pipeline = ThumbnailPipeline::new(&config, fetcher, codec);
        Self { config, pipeline }
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Watch the pipeline's lifecycle state.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.pipeline.subscribe()
    }

    /// Download every URL and produce its thumbnails.
    pub async fn make_thumbnails(&self, urls: Vec<String>) -> Result<RunReport> {
        self.pipeline.make_thumbnails(urls).await
    }

    /// Like [`make_thumbnails`](Self::make_thumbnails) with cooperative cancellation.
    pub async fn make_thumbnails_with_cancel(
        &self,
        urls: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        self.pipeline.make_thumbnails_with_cancel(urls, cancel).await
    }
}
