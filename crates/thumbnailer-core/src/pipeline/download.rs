//! Download stage: a fixed pool of workers draining a queue of URLs.
//!
//! Each worker claims one URL at a time, fetches it, persists the bytes to the
//! scratch directory and only then hands a [`DownloadedImage`] to the resize
//! stage. The stage returns once every worker has been joined; dropping the
//! last sender at that point closes the hand-off channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{PipelineError, PipelineResult, ThumbnailerError};
use crate::types::{DownloadedImage, FailureKind, ItemFailure, WorkItem};

use super::fetch::Fetcher;
use super::queue::WorkQueue;

/// Outcome of a finished download stage.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Images persisted and handed to the resize stage
    pub downloaded: usize,
    pub failures: Vec<ItemFailure>,
    pub elapsed: Duration,
    pub workers_spawned: usize,
}

/// What a single worker accomplished; summed after join.
#[derive(Debug, Default)]
struct WorkerTally {
    downloaded: usize,
    failures: Vec<ItemFailure>,
}

/// The download stage.
pub struct DownloadStage {
    fetcher: Arc<dyn Fetcher>,
    input_dir: PathBuf,
    concurrency: usize,
}

impl DownloadStage {
    pub fn new(fetcher: Arc<dyn Fetcher>, input_dir: PathBuf, concurrency: usize) -> Self {
        Self {
            fetcher,
            input_dir,
            concurrency: concurrency.max(1),
        }
    }

    /// Download every URL, sending each persisted image into `sender`.
    ///
    /// `sender` is dropped when this returns, which is what tells the resize
    /// stage that no more images are coming. Per-URL failures are collected
    /// in the report; only a panicked worker is an error.
    pub async fn run(
        &self,
        urls: Vec<String>,
        sender: mpsc::Sender<DownloadedImage>,
        cancel: CancellationToken,
    ) -> Result<DownloadReport, ThumbnailerError> {
        let start = Instant::now();
        let total = urls.len();
        let queue = Arc::new(WorkQueue::new(urls));
        let worker_count = self.concurrency.min(total);

        tracing::info!(
            "Beginning {} download(s) with {} worker(s) via {}",
            total,
            worker_count,
            self.fetcher.name()
        );

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let queue = queue.clone();
            let fetcher = self.fetcher.clone();
            let input_dir = self.input_dir.clone();
            let sender = sender.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                download_worker(worker_id, queue, fetcher, input_dir, sender, cancel).await
            }));
        }

        let mut report = DownloadReport {
            workers_spawned: worker_count,
            ..DownloadReport::default()
        };
        let mut panicked = None;
        for handle in handles {
            match handle.await {
                Ok(tally) => {
                    report.downloaded += tally.downloaded;
                    report.failures.extend(tally.failures);
                }
                Err(e) => {
                    tracing::error!("Download worker panicked: {e}");
                    panicked.get_or_insert_with(|| e.to_string());
                }
            }
        }

        // All workers are joined, so this is the last sender.
        drop(sender);

        if let Some(message) = panicked {
            return Err(ThumbnailerError::Worker {
                stage: "download",
                message,
            });
        }

        // Only non-empty after cancellation.
        for item in queue.drain() {
            report.failures.push(ItemFailure::new(
                item.url,
                FailureKind::Cancelled,
                "run cancelled before download started",
            ));
        }

        report.elapsed = start.elapsed();
        tracing::info!(
            "Downloaded {} of {} image(s) in {:.2} seconds",
            report.downloaded,
            total,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }
}

async fn download_worker(
    worker_id: usize,
    queue: Arc<WorkQueue>,
    fetcher: Arc<dyn Fetcher>,
    input_dir: PathBuf,
    sender: mpsc::Sender<DownloadedImage>,
    cancel: CancellationToken,
) -> WorkerTally {
    let mut tally = WorkerTally::default();

    loop {
        if cancel.is_cancelled() {
            tracing::debug!("Download worker {worker_id} stopping: cancelled");
            break;
        }
        let Some(item) = queue.claim() else {
            break;
        };

        tracing::debug!("Worker {worker_id} downloading {}", item.url);
        let image = match download_one(fetcher.as_ref(), &input_dir, &item).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Download failed: {e}");
                tally
                    .failures
                    .push(ItemFailure::new(&item.url, e.kind(), e.to_string()));
                continue;
            }
        };

        if let Err(mpsc::error::SendError(image)) = sender.send(image).await {
            tracing::warn!("Resize stage is gone; discarding {}", image.name);
            tally.failures.push(ItemFailure::new(
                &item.url,
                FailureKind::Cancelled,
                "resize stage stopped before accepting the image",
            ));
            tally
                .failures
                .extend(remove_scratch(&item.url, &image.scratch_path).await);
            break;
        }
        tally.downloaded += 1;
    }

    tally
}

/// Fetch one URL and persist it to the scratch directory.
async fn download_one(
    fetcher: &dyn Fetcher,
    input_dir: &Path,
    item: &WorkItem,
) -> PipelineResult<DownloadedImage> {
    let name = image_name_from_url(&item.url)?;
    let bytes = fetcher.fetch(&item.url).await?;

    // The index prefix keeps duplicate URLs from sharing a scratch file.
    let scratch_path = input_dir.join(format!("{}-{}", item.index, name));
    persist(&scratch_path, &bytes).await?;

    Ok(DownloadedImage {
        name,
        source_url: item.url.clone(),
        scratch_path,
        byte_len: bytes.len() as u64,
    })
}

/// Write `bytes` to `<path>.part`, sync, close, then rename into place.
async fn persist(path: &Path, bytes: &[u8]) -> PipelineResult<()> {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part_path = PathBuf::from(part);

    let result = async {
        let mut file = tokio::fs::File::create(&part_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&part_path, path).await
    }
    .await;

    if let Err(e) = result {
        if let Err(cleanup) = tokio::fs::remove_file(&part_path).await {
            tracing::debug!("Leaving {:?} behind: {cleanup}", part_path);
        }
        return Err(PipelineError::filesystem(path, &e));
    }
    Ok(())
}

/// Delete a scratch copy, turning a failed delete into a `Filesystem` failure.
pub(crate) async fn remove_scratch(subject: &str, path: &Path) -> Option<ItemFailure> {
    let e = tokio::fs::remove_file(path).await.err()?;
    let err = PipelineError::filesystem(path, &e);
    tracing::warn!("{err}");
    Some(ItemFailure::new(subject, err.kind(), err.to_string()))
}

/// Derive the image file name from the last path segment of a URL.
///
/// The segment is percent-decoded and path separators are replaced so the
/// name is always a single file inside the scratch and output directories.
pub fn image_name_from_url(url: &str) -> PipelineResult<String> {
    let invalid = |message: &str| PipelineError::InvalidUrl {
        url: url.to_string(),
        message: message.to_string(),
    };

    let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
    let segment = parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("URL path has no file name"))?;

    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let name: String = decoded
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect();

    if name.trim_matches('.').is_empty() {
        return Err(invalid("URL path has no file name"));
    }
    Ok(name)
}
