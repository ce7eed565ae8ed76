//! Output formatting for run reports.
//!
//! Reports are written as JSON for machines and summarized as a short
//! multi-line text block for humans.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{self, Write};

use crate::types::{FailureKind, RunReport};

/// A writer that serializes items as JSON, one document per call.
pub struct OutputWriter<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> OutputWriter<W> {
    /// Create a new output writer.
    ///
    /// * `writer` - The underlying writer (file, stdout, etc.)
    /// * `pretty` - Whether to pretty-print JSON
    pub fn new(writer: W, pretty: bool) -> Self {
        Self { writer, pretty }
    }

    /// Write a single item followed by a newline.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        }
        writeln!(self.writer)
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Human-readable summary of a run.
pub fn summarize(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Downloaded {}/{} image(s) in {:.2}s",
        report.images_downloaded,
        report.urls,
        report.timings.download.as_secs_f64()
    );
    let _ = writeln!(
        out,
        "Created {} thumbnail(s) in {:.2}s",
        report.thumbnails_created,
        report.timings.resize.as_secs_f64()
    );
    let _ = write!(
        out,
        "Total {:.2}s ({} mode)",
        report.timings.total.as_secs_f64(),
        report.mode
    );

    if report.has_failures() {
        let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for failure in &report.failures {
            *by_kind.entry(kind_label(failure.kind).to_string()).or_default() += 1;
        }
        let parts: Vec<String> = by_kind
            .iter()
            .map(|(kind, count)| format!("{count} {kind}"))
            .collect();
        let _ = write!(
            out,
            "\nFailures: {} ({})",
            report.failures.len(),
            parts.join(", ")
        );
    }
    out
}

fn kind_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Fetch => "fetch",
        FailureKind::Decode => "decode",
        FailureKind::Resize => "resize",
        FailureKind::Encode => "encode",
        FailureKind::Filesystem => "filesystem",
        FailureKind::Cancelled => "cancelled",
        FailureKind::Panicked => "panicked",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemFailure, PipelineMode, RunStatus, StageTimings};
    use std::time::{Duration, SystemTime};

    fn report(failures: Vec<ItemFailure>) -> RunReport {
        RunReport {
            mode: PipelineMode::Streaming,
            urls: 3,
            status: RunStatus::Complete,
            started_at: SystemTime::UNIX_EPOCH,
            finished_at: SystemTime::UNIX_EPOCH,
            images_downloaded: 2,
            thumbnails_created: 6,
            artifacts: Vec::new(),
            failures,
            timings: StageTimings {
                download: Duration::from_millis(1500),
                resize: Duration::from_millis(500),
                total: Duration::from_secs(2),
            },
        }
    }

    #[test]
    fn test_write_json() {
        let mut buffer = Vec::new();
        let mut writer = OutputWriter::new(&mut buffer, false);
        writer.write(&report(Vec::new())).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("\"images_downloaded\":2"));
        assert!(output.contains("\"mode\":\"streaming\""));
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn test_pretty_json_is_multiline() {
        let mut pretty = Vec::new();
        OutputWriter::new(&mut pretty, true)
            .write(&report(Vec::new()))
            .unwrap();
        assert!(String::from_utf8(pretty).unwrap().lines().count() > 1);

        let mut compact = Vec::new();
        OutputWriter::new(&mut compact, false)
            .write(&report(Vec::new()))
            .unwrap();
        assert_eq!(String::from_utf8(compact).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_summary_without_failures() {
        let summary = summarize(&report(Vec::new()));
        assert!(summary.contains("Downloaded 2/3 image(s) in 1.50s"));
        assert!(summary.contains("Created 6 thumbnail(s)"));
        assert!(!summary.contains("Failures"));
    }

    #[test]
    fn test_summary_groups_failures() {
        let summary = summarize(&report(vec![
            ItemFailure::new("https://x/a.png", FailureKind::Fetch, "404"),
            ItemFailure::new("b.png", FailureKind::Resize, "bad").with_width(32),
            ItemFailure::new("b.png", FailureKind::Resize, "bad").with_width(64),
        ]));
        assert!(summary.contains("Failures: 3 (1 fetch, 2 resize)"));
    }
}
