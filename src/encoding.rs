//! # Encoding Planning Module
//!
//! Maps a logical quality/format/alpha/losslessness request into concrete
//! encoder parameters for one of the supported output formats.
//!
//! ## Format resolution precedence
//! 1. Lossless requirement → PNG
//! 2. Web-preferred format → WebP
//! 3. Caller-specified format, defaulting to JPEG
//!
//! An image carrying an alpha channel is never planned as JPEG; PNG is
//! substituted at this stage.
//!
//! ## Quality semantics
//! - JPEG/WebP: the plan's `quality` is the encoder quality in [1,100].
//! - PNG: the plan's `quality` holds the compression level in [0,9], mapped
//!   from the requested quality as `(100 - quality) / 11` — higher requested
//!   quality yields lower compression effort.

use serde::{Deserialize, Serialize};

/// Output formats the codec backend can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    /// Conventional file extension for the format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    /// Parses a caller-supplied format label; unknown labels fall back to JPEG.
    pub fn parse(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "png" => OutputFormat::Png,
            "webp" => OutputFormat::WebP,
            _ => OutputFormat::Jpeg,
        }
    }
}

/// Concrete encoder parameters, ready to hand to the codec backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingPlan {
    pub format: OutputFormat,
    /// Encoder quality for JPEG/WebP (1-100), compression level for PNG (0-9).
    pub quality: u8,
    /// Progressive scan flag; only ever set for JPEG.
    pub progressive: bool,
}

/// Stateless planner for encoder parameters.
pub struct EncodingPlanner;

impl EncodingPlanner {
    const PNG_MAX_COMPRESSION: u8 = 9;

    /// Plans encoder parameters for one output.
    ///
    /// # Arguments
    /// * `requested` - caller-specified format, if any
    /// * `quality` - logical quality request (clamped into 1-100)
    /// * `has_alpha` - whether the source pixels carry an alpha channel
    /// * `lossless_required` - explicit lossless requirement
    /// * `progressive_required` - progressive scan request (JPEG only)
    /// * `prefer_web_format` - web-preferred (WebP) format request
    pub fn plan(
        requested: Option<OutputFormat>,
        quality: u8,
        has_alpha: bool,
        lossless_required: bool,
        progressive_required: bool,
        prefer_web_format: bool,
    ) -> EncodingPlan {
        let quality = quality.clamp(1, 100);

        let mut format = if lossless_required {
            OutputFormat::Png
        } else if prefer_web_format {
            OutputFormat::WebP
        } else {
            requested.unwrap_or(OutputFormat::Jpeg)
        };

        // JPEG cannot represent alpha; substitute PNG
        if has_alpha && format == OutputFormat::Jpeg {
            format = OutputFormat::Png;
        }

        match format {
            OutputFormat::Png => EncodingPlan {
                format,
                quality: Self::png_compression_level(quality),
                progressive: false,
            },
            OutputFormat::Jpeg => EncodingPlan {
                format,
                quality,
                progressive: progressive_required,
            },
            OutputFormat::WebP => EncodingPlan {
                format,
                quality,
                progressive: false,
            },
        }
    }

    /// Maps a quality request onto a PNG compression level in [0,9].
    pub fn png_compression_level(quality: u8) -> u8 {
        ((100u8.saturating_sub(quality)) / 11).min(Self::PNG_MAX_COMPRESSION)
    }
}
