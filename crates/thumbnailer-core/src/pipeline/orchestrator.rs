//! Pipeline orchestration - wires the download stage to the resize stage.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, PipelineConfig};
use crate::error::{Result, ThumbnailerError};
use crate::types::{PipelineMode, PipelineState, RunReport, RunStatus, StageTimings};

use super::channel::handoff_channel;
use super::codec::ImageCodec;
use super::download::{DownloadReport, DownloadStage};
use super::fetch::Fetcher;
use super::resize::{ResizeReport, ResizeStage};

/// Runs the two-stage download → resize pipeline.
///
/// State moves `Idle → Downloading → Resizing → Complete`, or to `Failed`
/// when the run aborts. In streaming mode both stages are active while the
/// state reads `Downloading`; it flips to `Resizing` once every download
/// worker has been joined.
pub struct ThumbnailPipeline {
    pipeline: PipelineConfig,
    input_dir: PathBuf,
    output_dir: PathBuf,
    download: DownloadStage,
    resize: ResizeStage,
    state: watch::Sender<PipelineState>,
}

impl ThumbnailPipeline {
    /// Create a pipeline with explicit fetch and codec implementations.
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>, codec: Arc<dyn ImageCodec>) -> Self {
        let input_dir = config.input_dir();
        let output_dir = config.output_dir();
        let (state, _) = watch::channel(PipelineState::Idle);

        Self {
            pipeline: config.pipeline.clone(),
            download: DownloadStage::new(
                fetcher,
                input_dir.clone(),
                config.pipeline.download_concurrency,
            ),
            resize: ResizeStage::new(
                codec,
                output_dir.clone(),
                config.pipeline.resize_concurrency,
            ),
            input_dir,
            output_dir,
            state,
        }
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Download every URL and produce its thumbnails.
    pub async fn make_thumbnails(&self, urls: Vec<String>) -> Result<RunReport> {
        self.make_thumbnails_with_cancel(urls, CancellationToken::new())
            .await
    }

    /// Like [`make_thumbnails`](Self::make_thumbnails), stopping cooperatively
    /// between items once `cancel` fires.
    pub async fn make_thumbnails_with_cancel(
        &self,
        urls: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let started_at = SystemTime::now();
        let start = Instant::now();
        let mode = self.pipeline.mode;
        let url_count = urls.len();
        tracing::info!("START make_thumbnails: {} url(s), {} mode", url_count, mode);

        if let Err(e) = self.prepare_directories() {
            tracing::error!("{e}");
            self.set_state(PipelineState::Failed);
            return Err(e);
        }

        if urls.is_empty() {
            tracing::info!("No URLs given; nothing to do");
            self.set_state(PipelineState::Complete);
            return Ok(assemble(
                mode,
                0,
                started_at,
                start,
                DownloadReport::default(),
                ResizeReport::default(),
                RunStatus::Complete,
            ));
        }

        self.set_state(PipelineState::Downloading);
        let (sender, receiver) = handoff_channel(&self.pipeline, mode, url_count);

        let stages = match mode {
            PipelineMode::Streaming => {
                let downloads = async {
                    let report = self.download.run(urls, sender, cancel.clone()).await;
                    self.set_state(PipelineState::Resizing);
                    report
                };
                let resizes = self.resize.run(receiver, cancel.clone());
                let (downloaded, resized) = tokio::join!(downloads, resizes);
                downloaded.and_then(|d| resized.map(|r| (d, r)))
            }
            PipelineMode::Batch => {
                match self.download.run(urls, sender, cancel.clone()).await {
                    Ok(downloaded) => {
                        self.set_state(PipelineState::Resizing);
                        self.resize
                            .run(receiver, cancel.clone())
                            .await
                            .map(|resized| (downloaded, resized))
                    }
                    Err(e) => Err(e),
                }
            }
        };

        let (downloaded, resized) = match stages {
            Ok(reports) => reports,
            Err(e) => {
                tracing::error!("Run aborted: {e}");
                self.set_state(PipelineState::Failed);
                return Err(e);
            }
        };

        let status = if cancel.is_cancelled() {
            RunStatus::Cancelled
        } else {
            RunStatus::Complete
        };
        let report = assemble(mode, url_count, started_at, start, downloaded, resized, status);
        self.set_state(PipelineState::Complete);

        if report.has_failures() {
            tracing::warn!("{} item(s) failed", report.failures.len());
        }
        tracing::info!(
            "END make_thumbnails: {} downloaded, {} thumbnail(s) in {:.2} seconds",
            report.images_downloaded,
            report.thumbnails_created,
            report.timings.total.as_secs_f64()
        );
        Ok(report)
    }

    /// Create the scratch and output directories. Failure here is fatal.
    fn prepare_directories(&self) -> Result<()> {
        for dir in [&self.input_dir, &self.output_dir] {
            create_dir(dir)?;
        }
        Ok(())
    }

    fn set_state(&self, state: PipelineState) {
        tracing::debug!("Pipeline state: {:?}", state);
        self.state.send_replace(state);
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| ThumbnailerError::Setup {
        path: dir.to_path_buf(),
        source,
    })
}

fn assemble(
    mode: PipelineMode,
    urls: usize,
    started_at: SystemTime,
    start: Instant,
    downloaded: DownloadReport,
    resized: ResizeReport,
    status: RunStatus,
) -> RunReport {
    let mut artifacts = resized.artifacts;
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));

    let mut failures = downloaded.failures;
    failures.extend(resized.failures);

    RunReport {
        mode,
        urls,
        status,
        started_at,
        finished_at: SystemTime::now(),
        images_downloaded: downloaded.downloaded,
        thumbnails_created: artifacts.len(),
        artifacts,
        failures,
        timings: StageTimings {
            download: downloaded.elapsed,
            resize: resized.elapsed,
            total: start.elapsed(),
        },
    }
}
