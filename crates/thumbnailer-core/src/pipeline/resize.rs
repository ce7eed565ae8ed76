//! Resize stage: a fixed pool of workers turning downloads into thumbnails.
//!
//! Workers share the receiving end of the hand-off channel. Each pulls one
//! image, processes it to completion on a blocking thread, then pulls the
//! next. A worker exits only when the channel is closed and drained, so it
//! never gives up while the download stage may still produce.

use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, PipelineResult, ThumbnailerError};
use crate::types::{DownloadedImage, FailureKind, ItemFailure, ThumbnailArtifact, TARGET_WIDTHS};

use super::codec::{output_format, DecodedImage, ImageCodec};
use super::download::remove_scratch;

/// Outcome of a finished resize stage.
#[derive(Debug, Default)]
pub struct ResizeReport {
    /// Downloaded images taken off the channel
    pub images_received: usize,
    pub artifacts: Vec<ThumbnailArtifact>,
    pub failures: Vec<ItemFailure>,
    pub elapsed: Duration,
    pub workers_spawned: usize,
}

/// Result of processing one downloaded image.
#[derive(Debug, Default)]
pub struct ImageOutcome {
    pub artifacts: Vec<ThumbnailArtifact>,
    pub failures: Vec<ItemFailure>,
}

#[derive(Debug, Default)]
struct WorkerTally {
    images_received: usize,
    outcome: ImageOutcome,
}

impl WorkerTally {
    fn absorb(&mut self, outcome: ImageOutcome) {
        self.outcome.artifacts.extend(outcome.artifacts);
        self.outcome.failures.extend(outcome.failures);
    }
}

/// The resize stage.
pub struct ResizeStage {
    codec: Arc<dyn ImageCodec>,
    output_dir: PathBuf,
    concurrency: usize,
}

impl ResizeStage {
    pub fn new(codec: Arc<dyn ImageCodec>, output_dir: PathBuf, concurrency: usize) -> Self {
        Self {
            codec,
            output_dir,
            concurrency: concurrency.max(1),
        }
    }

    /// Resize every image arriving on `receiver` until the channel closes.
    pub async fn run(
        &self,
        receiver: mpsc::Receiver<DownloadedImage>,
        cancel: CancellationToken,
    ) -> Result<ResizeReport, ThumbnailerError> {
        let start = Instant::now();
        let receiver = Arc::new(Mutex::new(receiver));

        tracing::info!(
            "Beginning image resizing with {} worker(s) into {:?}",
            self.concurrency,
            self.output_dir
        );

        let mut handles = Vec::with_capacity(self.concurrency);
        for worker_id in 0..self.concurrency {
            let receiver = receiver.clone();
            let codec = self.codec.clone();
            let output_dir = self.output_dir.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                resize_worker(worker_id, receiver, codec, output_dir, cancel).await
            }));
        }

        let mut report = ResizeReport {
            workers_spawned: self.concurrency,
            ..ResizeReport::default()
        };
        let mut panicked = None;
        for handle in handles {
            match handle.await {
                Ok(tally) => {
                    report.images_received += tally.images_received;
                    report.artifacts.extend(tally.outcome.artifacts);
                    report.failures.extend(tally.outcome.failures);
                }
                Err(e) => {
                    tracing::error!("Resize worker panicked: {e}");
                    panicked.get_or_insert_with(|| e.to_string());
                }
            }
        }

        if let Some(message) = panicked {
            return Err(ThumbnailerError::Worker {
                stage: "resize",
                message,
            });
        }

        report.elapsed = start.elapsed();
        tracing::info!(
            "Created {} thumbnail(s) from {} image(s) in {:.2} seconds",
            report.artifacts.len(),
            report.images_received,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }
}

async fn resize_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<DownloadedImage>>>,
    codec: Arc<dyn ImageCodec>,
    output_dir: PathBuf,
    cancel: CancellationToken,
) -> WorkerTally {
    let mut tally = WorkerTally::default();

    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        // None: the download stage is done and the buffer is empty.
        let Some(image) = next else {
            break;
        };
        tally.images_received += 1;

        if cancel.is_cancelled() {
            tally.absorb(discard(image).await);
            continue;
        }

        tracing::debug!("Worker {worker_id} resizing {}", image.name);
        let name = image.name.clone();
        let scratch_path = image.scratch_path.clone();
        let codec = codec.clone();
        let output_dir = output_dir.clone();

        match tokio::task::spawn_blocking(move || {
            resize_downloaded(codec.as_ref(), &output_dir, image)
        })
        .await
        {
            Ok(outcome) => tally.absorb(outcome),
            // Widths finished before the panic stay on disk but are not reported.
            Err(e) => {
                tracing::error!("Resizing {name} panicked: {e}");
                tally.outcome.failures.push(ItemFailure::new(
                    &name,
                    FailureKind::Panicked,
                    format!("resize task panicked: {e}"),
                ));
                tally
                    .outcome
                    .failures
                    .extend(remove_scratch(&name, &scratch_path).await);
            }
        }
    }

    tally
}

/// Drop a downloaded image without resizing it.
async fn discard(image: DownloadedImage) -> ImageOutcome {
    let mut outcome = ImageOutcome::default();
    outcome.failures.push(ItemFailure::new(
        &image.name,
        FailureKind::Cancelled,
        "run cancelled before resizing",
    ));
    outcome
        .failures
        .extend(remove_scratch(&image.name, &image.scratch_path).await);
    outcome
}

/// Produce every target width for one image, then delete its scratch copy.
///
/// The image is decoded once and each width is resized from that decoded
/// source. A failing width does not stop the others. The scratch copy is
/// removed after all widths were attempted, whatever their outcome.
///
/// Each artifact is staged under a hidden `.part` name and renamed into
/// place, so readers never see a partially written thumbnail.
pub fn resize_downloaded(
    codec: &dyn ImageCodec,
    output_dir: &Path,
    image: DownloadedImage,
) -> ImageOutcome {
    let mut outcome = ImageOutcome::default();

    let decoded = std::fs::read(&image.scratch_path)
        .map_err(|e| PipelineError::filesystem(&image.scratch_path, &e))
        .and_then(|bytes| codec.decode(&bytes, &image.name));

    match decoded {
        Ok(decoded) => {
            let format = output_format(&image.name, decoded.format);
            for &width in TARGET_WIDTHS.iter() {
                match render_width(codec, output_dir, &image, &decoded, format, width) {
                    Ok(artifact) => outcome.artifacts.push(artifact),
                    Err(e) => {
                        tracing::warn!("{e}");
                        let failure = ItemFailure::new(&image.name, e.kind(), e.to_string());
                        outcome.failures.push(failure.with_width(width));
                    }
                }
            }
        }
        Err(e) => {
            tracing::warn!("Skipping {}: {e}", image.name);
            outcome
                .failures
                .push(ItemFailure::new(&image.name, e.kind(), e.to_string()));
        }
    }

    if let Err(e) = std::fs::remove_file(&image.scratch_path) {
        let err = PipelineError::filesystem(&image.scratch_path, &e);
        tracing::warn!("{err}");
        outcome
            .failures
            .push(ItemFailure::new(&image.name, err.kind(), err.to_string()));
    }

    tracing::debug!(
        "Done resizing {} ({} artifact(s))",
        image.name,
        outcome.artifacts.len()
    );
    outcome
}

fn render_width(
    codec: &dyn ImageCodec,
    output_dir: &Path,
    image: &DownloadedImage,
    decoded: &DecodedImage,
    format: ImageFormat,
    width: u32,
) -> PipelineResult<ThumbnailArtifact> {
    let resized = codec.resize(&decoded.image, width, &image.name)?;
    let bytes = codec.encode(&resized, format, width, &image.name)?;

    let path = output_dir.join(image.artifact_name(width));
    publish(&path, &part_path(output_dir, image, width), &bytes)?;

    Ok(ThumbnailArtifact {
        source_name: image.name.clone(),
        width: resized.width(),
        height: resized.height(),
        path,
    })
}

/// Staging name for one artifact. It is unique per scratch copy, so two
/// images sharing a base name never write into the same partial file.
fn part_path(output_dir: &Path, image: &DownloadedImage, width: u32) -> PathBuf {
    let scratch = image
        .scratch_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| image.name.clone());
    output_dir.join(format!(".{scratch}-{width}.part"))
}

/// Write `bytes` to `part`, then rename it over `path`.
fn publish(path: &Path, part: &Path, bytes: &[u8]) -> PipelineResult<()> {
    let result = std::fs::write(part, bytes).and_then(|()| std::fs::rename(part, path));
    if let Err(e) = result {
        if let Err(cleanup) = std::fs::remove_file(part) {
            tracing::debug!("Leaving {:?} behind: {cleanup}", part);
        }
        return Err(PipelineError::filesystem(path, &e));
    }
    Ok(())
}
