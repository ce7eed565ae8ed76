//! Bounded hand-off channel between the download and resize stages.
//!
//! Closing the sending side is the only "no more downloads" signal the resize
//! stage ever sees: `recv()` returns `None` once every sender is dropped and
//! the buffer is empty.

use tokio::sync::mpsc;

use crate::config::PipelineConfig;
use crate::types::{DownloadedImage, PipelineMode};

/// Create a bounded channel pair with the given capacity (at least 1).
pub fn bounded_channel<T>(capacity: usize) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(capacity.max(1))
}

/// Capacity of the inter-stage channel for a run of `items` URLs.
///
/// Streaming mode uses the configured buffer so downloads get backpressure
/// from slow resizing. Batch mode has no consumer until every download
/// finished, so the buffer must hold the whole batch.
pub fn handoff_capacity(config: &PipelineConfig, mode: PipelineMode, items: usize) -> usize {
    match mode {
        PipelineMode::Streaming => config.buffer_size.min(items.max(1)),
        PipelineMode::Batch => items.max(1),
    }
}

/// Create the inter-stage channel for a run.
pub fn handoff_channel(
    config: &PipelineConfig,
    mode: PipelineMode,
    items: usize,
) -> (mpsc::Sender<DownloadedImage>, mpsc::Receiver<DownloadedImage>) {
    bounded_channel(handoff_capacity(config, mode, items))
}
