//! The `thumbnailer run` command.

use clap::{Args, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use thumbnailer_core::{summarize, Config, OutputWriter, PipelineMode, RunStatus, Thumbnailer};
use tokio_util::sync::CancellationToken;

/// Pipeline mode as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Resize while downloads are still running
    Streaming,
    /// Resize only after every download finished
    Batch,
}

impl From<ModeArg> for PipelineMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Streaming => PipelineMode::Streaming,
            ModeArg::Batch => PipelineMode::Batch,
        }
    }
}

/// Pipeline settings that can be given on the command line.
#[derive(Args, Debug, Default)]
pub struct PipelineOverrides {
    /// Home directory holding the scratch and output folders
    #[arg(long, env = "THUMBNAILER_HOME")]
    pub home: Option<PathBuf>,

    /// Pipeline mode (defaults to the configured mode)
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Number of concurrent downloads
    #[arg(long)]
    pub download_workers: Option<usize>,

    /// Number of concurrent resize workers
    #[arg(long)]
    pub resize_workers: Option<usize>,
}

impl PipelineOverrides {
    /// Command-line values win over the config file.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(ref home) = self.home {
            config.general.home_dir = home.clone();
        }
        if let Some(mode) = self.mode {
            config.pipeline.mode = mode.into();
        }
        if let Some(workers) = self.download_workers {
            config.pipeline.download_concurrency = workers;
        }
        if let Some(workers) = self.resize_workers {
            config.pipeline.resize_concurrency = workers;
        }
        config
    }
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image URLs to thumbnail
    pub urls: Vec<String>,

    /// File with one URL per line (blank lines and `#` comments are skipped)
    #[arg(long)]
    pub url_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: PipelineOverrides,

    /// Write the JSON report to this file instead of stdout
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,
}

/// Execute the run command.
pub async fn execute(args: RunArgs, config: Config) -> anyhow::Result<()> {
    let urls = collect_urls(&args)?;
    if urls.is_empty() {
        tracing::warn!("No URLs given; nothing to do");
    } else {
        tracing::info!("Thumbnailing {} URL(s)", urls.len());
    }

    let config = args.overrides.apply(config);
    let pretty = args.pretty || config.output.pretty;
    let thumbnailer = Thumbnailer::new(config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing in-flight work");
            ctrl_c.cancel();
        }
    });

    let report = thumbnailer.make_thumbnails_with_cancel(urls, cancel).await?;

    for line in summarize(&report).lines() {
        tracing::info!("{line}");
    }
    for failure in &report.failures {
        match failure.width {
            Some(width) => {
                tracing::debug!("  {} @{}px: {}", failure.subject, width, failure.message)
            }
            None => tracing::debug!("  {}: {}", failure.subject, failure.message),
        }
    }
    if report.status == RunStatus::Cancelled {
        tracing::warn!("Run was cancelled before all images were processed");
    }

    match args.report {
        Some(ref path) => {
            let file = File::create(path)?;
            let mut writer = OutputWriter::new(BufWriter::new(file), pretty);
            writer.write(&report)?;
            writer.flush()?;
            tracing::info!("Report written to {:?}", path);
        }
        None => {
            let mut writer = OutputWriter::new(io::stdout().lock(), pretty);
            writer.write(&report)?;
            writer.flush()?;
        }
    }

    Ok(())
}

/// Positional URLs first, then those from `--url-file`.
fn collect_urls(args: &RunArgs) -> anyhow::Result<Vec<String>> {
    let mut urls = args.urls.clone();
    if let Some(ref path) = args.url_file {
        urls.extend(read_url_file(path)?);
    }
    Ok(urls)
}

fn read_url_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let content = std::fs::read_to_string(&expanded).map_err(|e| {
        anyhow::anyhow!(
            "Cannot read URL file {:?}: {e}\n\n  Hint: Check the file path and try again.",
            path
        )
    })?;
    Ok(parse_url_list(&content))
}

/// One URL per line; blank lines and lines starting with `#` are skipped.
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
