//! Decode, resize and encode primitives used by resize workers.
//!
//! All methods are synchronous and CPU bound; the resize stage calls them
//! from blocking threads.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Result of decoding an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

/// Image decode/resize/encode capability.
///
/// `name` is only used for error context.
pub trait ImageCodec: Send + Sync {
    /// Decode raw bytes into an image.
    fn decode(&self, bytes: &[u8], name: &str) -> Result<DecodedImage, PipelineError>;

    /// Resize to `width`, preserving aspect ratio.
    fn resize(
        &self,
        image: &DynamicImage,
        width: u32,
        name: &str,
    ) -> Result<DynamicImage, PipelineError>;

    /// Encode an image into `format`.
    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        width: u32,
        name: &str,
    ) -> Result<Vec<u8>, PipelineError>;
}

/// Height that keeps the aspect ratio of a `src_width` x `src_height` image
/// at `target_width`, rounded to the nearest pixel and never zero.
pub fn scaled_height(src_width: u32, src_height: u32, target_width: u32) -> u32 {
    if src_width == 0 {
        return 1;
    }
    let height = f64::from(src_height) * f64::from(target_width) / f64::from(src_width);
    (height.round() as u32).max(1)
}

/// Format to encode artifacts in: the one implied by the source file name,
/// falling back to whatever the bytes turned out to be.
pub fn output_format(name: &str, detected: ImageFormat) -> ImageFormat {
    ImageFormat::from_path(name).unwrap_or(detected)
}

/// Codec backed by the `image` crate, resampling with Lanczos3.
pub struct RasterCodec {
    limits: LimitsConfig,
}

impl RasterCodec {
    /// Create a new codec with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }
}

impl ImageCodec for RasterCodec {
    fn decode(&self, bytes: &[u8], name: &str) -> Result<DecodedImage, PipelineError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                name: name.to_string(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        let format = match reader.format() {
            Some(f) => f,
            None => ImageFormat::from_path(Path::new(name)).map_err(|_| PipelineError::Decode {
                name: name.to_string(),
                message: "Unsupported image format".to_string(),
            })?,
        };
        let image = reader.decode().map_err(|e| PipelineError::Decode {
            name: name.to_string(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                name: name.to_string(),
                width,
                height,
                max_dim,
            });
        }
        if width == 0 || height == 0 {
            return Err(PipelineError::Decode {
                name: name.to_string(),
                message: format!("Degenerate image dimensions {width}x{height}"),
            });
        }

        Ok(DecodedImage {
            image,
            format,
            width,
            height,
        })
    }

    fn resize(
        &self,
        image: &DynamicImage,
        width: u32,
        name: &str,
    ) -> Result<DynamicImage, PipelineError> {
        if width == 0 {
            return Err(PipelineError::Resize {
                name: name.to_string(),
                width,
                message: "target width must be > 0".to_string(),
            });
        }
        let (src_width, src_height) = image.dimensions();
        let height = scaled_height(src_width, src_height, width);
        Ok(image.resize_exact(width, height, FilterType::Lanczos3))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        width: u32,
        name: &str,
    ) -> Result<Vec<u8>, PipelineError> {
        let mut buffer = Cursor::new(Vec::new());
        let result = match format {
            // The JPEG encoder has no alpha channel support.
            ImageFormat::Jpeg => {
                DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut buffer, format)
            }
            _ => image.write_to(&mut buffer, format),
        };
        result.map_err(|e| PipelineError::Encode {
            name: name.to_string(),
            width,
            message: e.to_string(),
        })?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::encoded_image;

    #[test]
    fn test_scaled_height_rounds() {
        // 199 * 200 / 300 = 132.67, truncation would give 132
        assert_eq!(scaled_height(300, 199, 200), 133);
        assert_eq!(scaled_height(300, 199, 64), 42);
        assert_eq!(scaled_height(300, 199, 32), 21);
        assert_eq!(scaled_height(400, 300, 200), 150);
    }

    #[test]
    fn test_scaled_height_never_zero() {
        assert_eq!(scaled_height(10_000, 10, 32), 1);
        assert_eq!(scaled_height(0, 10, 32), 1);
    }

    #[test]
    fn test_output_format_follows_name() {
        assert_eq!(output_format("a.jpg", ImageFormat::Png), ImageFormat::Jpeg);
        assert_eq!(output_format("a.PNG", ImageFormat::Jpeg), ImageFormat::Png);
        assert_eq!(output_format("noext", ImageFormat::Gif), ImageFormat::Gif);
    }

    #[test]
    fn test_decode_detects_format_by_content() {
        let codec = RasterCodec::new(LimitsConfig::default());
        let bytes = encoded_image(40, 30, ImageFormat::Png);

        let decoded = codec.decode(&bytes, "misnamed.jpg").unwrap();
        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!((decoded.width, decoded.height), (40, 30));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let codec = RasterCodec::new(LimitsConfig::default());
        let err = codec.decode(b"definitely not an image", "x.png").unwrap_err();
        assert_eq!(err.kind(), crate::types::FailureKind::Decode);
    }

    #[test]
    fn test_decode_enforces_dimension_limit() {
        let codec = RasterCodec::new(LimitsConfig {
            max_image_dimension: 20,
            ..LimitsConfig::default()
        });
        let bytes = encoded_image(40, 10, ImageFormat::Png);

        match codec.decode(&bytes, "wide.png") {
            Err(PipelineError::ImageTooLarge { width, .. }) => assert_eq!(width, 40),
            Err(other) => panic!("expected ImageTooLarge, got {other}"),
            Ok(_) => panic!("expected ImageTooLarge, got an image"),
        }
    }

    #[test]
    fn test_resize_preserves_aspect_ratio() {
        let codec = RasterCodec::new(LimitsConfig::default());
        let image = DynamicImage::new_rgb8(300, 199);

        let resized = codec.resize(&image, 200, "a.png").unwrap();
        assert_eq!(resized.dimensions(), (200, 133));
    }

    #[test]
    fn test_resize_rejects_zero_width() {
        let codec = RasterCodec::new(LimitsConfig::default());
        let image = DynamicImage::new_rgb8(10, 10);
        assert!(codec.resize(&image, 0, "a.png").is_err());
    }

    #[test]
    fn test_encode_jpeg_drops_alpha() {
        let codec = RasterCodec::new(LimitsConfig::default());
        let image = DynamicImage::new_rgba8(16, 16);

        let bytes = codec.encode(&image, ImageFormat::Jpeg, 16, "a.jpg").unwrap();
        // JPEG SOI marker
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_png() {
        let codec = RasterCodec::new(LimitsConfig::default());
        let image = DynamicImage::new_rgb8(16, 16);

        let bytes = codec.encode(&image, ImageFormat::Png, 16, "a.png").unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
