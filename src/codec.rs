//! # Codec Backend Module
//!
//! The pixel codec collaborator boundary. The pipeline never touches encoder
//! internals directly; everything goes through the [`Codec`] trait so tests
//! can substitute deterministic fakes and the backend can be swapped.
//!
//! [`StandardCodec`] implements the trait over the `image` crate (JPEG, PNG
//! with alpha) and the `webp` crate for lossy WebP encoding.

use crate::encoding::{EncodingPlan, OutputFormat};
use crate::error::MediaError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{ColorType, DynamicImage, ImageEncoder};

/// Opaque decode/encode collaborator used by the pipeline.
pub trait Codec: Send + Sync {
    /// Decodes raw bytes into a pixel buffer.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, MediaError>;

    /// Encodes a pixel buffer according to an [`EncodingPlan`].
    fn encode(&self, image: &DynamicImage, plan: &EncodingPlan) -> Result<Vec<u8>, MediaError>;
}

/// Default codec backend over the `image` and `webp` crates.
#[derive(Debug, Default)]
pub struct StandardCodec;

impl StandardCodec {
    pub fn new() -> Self {
        Self
    }

    fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, MediaError> {
        // Alpha is flattened; the planner never routes alpha sources here,
        // but a direct caller may.
        let rgb = image.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder
            .encode_image(&rgb)
            .map_err(|e| MediaError::Encode(format!("JPEG encode failed: {}", e)))?;
        Ok(buffer)
    }

    fn encode_png(image: &DynamicImage, compression_level: u8) -> Result<Vec<u8>, MediaError> {
        // The backend exposes compression classes rather than levels 0-9.
        let compression = match compression_level {
            0..=2 => CompressionType::Fast,
            3..=7 => CompressionType::Default,
            _ => CompressionType::Best,
        };

        let mut buffer = Vec::new();
        let encoder = PngEncoder::new_with_quality(&mut buffer, compression, PngFilter::Adaptive);

        if image.color().has_alpha() {
            let rgba = image.to_rgba8();
            encoder
                .write_image(&rgba, rgba.width(), rgba.height(), ColorType::Rgba8)
                .map_err(|e| MediaError::Encode(format!("PNG encode failed: {}", e)))?;
        } else {
            let rgb = image.to_rgb8();
            encoder
                .write_image(&rgb, rgb.width(), rgb.height(), ColorType::Rgb8)
                .map_err(|e| MediaError::Encode(format!("PNG encode failed: {}", e)))?;
        }
        Ok(buffer)
    }

    fn encode_webp(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, MediaError> {
        let rgba = image.to_rgba8();
        let encoder = webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height());
        let memory = if quality >= 100 {
            encoder.encode_lossless()
        } else {
            encoder.encode(quality as f32)
        };
        Ok(memory.to_vec())
    }
}

impl Codec for StandardCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, MediaError> {
        image::load_from_memory(bytes).map_err(|e| MediaError::Decode(e.to_string()))
    }

    fn encode(&self, image: &DynamicImage, plan: &EncodingPlan) -> Result<Vec<u8>, MediaError> {
        match plan.format {
            // The backend emits baseline scans; the progressive flag travels
            // with the plan for encoders that honor it.
            OutputFormat::Jpeg => Self::encode_jpeg(image, plan.quality),
            OutputFormat::Png => Self::encode_png(image, plan.quality),
            OutputFormat::WebP => Self::encode_webp(image, plan.quality),
        }
    }
}
