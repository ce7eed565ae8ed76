//! Shared fixtures for unit tests: in-memory fetchers and codec wrappers.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::LimitsConfig;
use crate::error::PipelineError;
use crate::pipeline::codec::{DecodedImage, ImageCodec, RasterCodec};
use crate::pipeline::fetch::Fetcher;

/// Encode a gradient image of the given size.
pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, format)
        .unwrap();
    buffer.into_inner()
}

/// Serves canned bodies by URL; anything unknown is a 404.
pub struct MockFetcher {
    bodies: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    finished: Arc<Mutex<Vec<Instant>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            bodies: HashMap::new(),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve a PNG of the given size at `url`.
    pub fn with_png(mut self, url: &str, width: u32, height: u32) -> Self {
        self.bodies
            .insert(url.to_string(), encoded_image(width, height, ImageFormat::Png));
        self
    }

    /// Serve arbitrary bytes at `url`.
    pub fn with_body(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies.insert(url.to_string(), body.to_vec());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Highest number of concurrent `fetch` calls observed.
    pub fn max_in_flight_handle(&self) -> Arc<AtomicUsize> {
        self.max_in_flight.clone()
    }

    pub fn calls_handle(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// When each `fetch` call returned.
    pub fn finished_handle(&self) -> Arc<Mutex<Vec<Instant>>> {
        self.finished.clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = self
            .bodies
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::Fetch {
                url: url.to_string(),
                message: "HTTP 404 Not Found".to_string(),
                status_code: Some(404),
            });

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().unwrap().push(Instant::now());
        result
    }
}

/// What goes wrong at the faulty width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Resize,
    Encode,
    Panic,
}

/// Wraps [`RasterCodec`] and breaks one width.
pub struct FailingWidthCodec {
    inner: RasterCodec,
    fail_width: u32,
    fault: Fault,
    decode_starts: Arc<Mutex<Vec<Instant>>>,
}

impl FailingWidthCodec {
    /// Fail every resize to `fail_width`.
    pub fn new(fail_width: u32) -> Self {
        Self::with_fault(fail_width, Fault::Resize)
    }

    pub fn with_fault(fail_width: u32, fault: Fault) -> Self {
        Self {
            inner: RasterCodec::new(LimitsConfig::default()),
            fail_width,
            fault,
            decode_starts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A codec that never fails and only records decode times.
    pub fn healthy() -> Self {
        Self::with_fault(0, Fault::Resize)
    }

    /// When each `decode` call started.
    pub fn decode_starts_handle(&self) -> Arc<Mutex<Vec<Instant>>> {
        self.decode_starts.clone()
    }
}

impl ImageCodec for FailingWidthCodec {
    fn decode(&self, bytes: &[u8], name: &str) -> Result<DecodedImage, PipelineError> {
        self.decode_starts.lock().unwrap().push(Instant::now());
        self.inner.decode(bytes, name)
    }

    fn resize(
        &self,
        image: &DynamicImage,
        width: u32,
        name: &str,
    ) -> Result<DynamicImage, PipelineError> {
        if width == self.fail_width {
            match self.fault {
                Fault::Resize => {
                    return Err(PipelineError::Resize {
                        name: name.to_string(),
                        width,
                        message: "injected failure".to_string(),
                    })
                }
                Fault::Panic => panic!("injected panic resizing {name} to {width}px"),
                Fault::Encode => {}
            }
        }
        self.inner.resize(image, width, name)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        width: u32,
        name: &str,
    ) -> Result<Vec<u8>, PipelineError> {
        if width == self.fail_width && self.fault == Fault::Encode {
            return Err(PipelineError::Encode {
                name: name.to_string(),
                width,
                message: "injected failure".to_string(),
            });
        }
        self.inner.encode(image, format, width, name)
    }
}

/// Names of regular files directly inside `dir`, sorted.
pub fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
