//! The download → resize pipeline.
//!
//! - **queue**: Shared URL queue with atomic, non-blocking claims
//! - **fetch**: The `Fetcher` boundary and its HTTP implementation
//! - **codec**: The `ImageCodec` boundary and its `image`-crate implementation
//! - **channel**: Bounded hand-off between stages; closure is the sentinel
//! - **download**: Download worker pool
//! - **resize**: Resize worker pool
//! - **orchestrator**: Wires the stages together and reports the run

pub mod channel;
pub mod codec;
pub mod download;
pub mod fetch;
pub mod orchestrator;
pub mod queue;
pub mod resize;

// Re-exports for convenient access
pub use codec::{scaled_height, DecodedImage, ImageCodec, RasterCodec};
pub use download::{image_name_from_url, DownloadReport, DownloadStage};
pub use fetch::{Fetcher, HttpFetcher};
pub use orchestrator::ThumbnailPipeline;
pub use queue::WorkQueue;
pub use resize::{resize_downloaded, ImageOutcome, ResizeReport, ResizeStage};
