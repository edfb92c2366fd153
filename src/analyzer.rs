//! # Media Analysis Module
//!
//! Classifies raw bytes into a media type/format/dimension/alpha profile
//! using magic-byte inspection plus a decode probe through the codec
//! collaborator.
//!
//! ## Classification strategy
//! 1. Magic bytes identify the container format independently of decodability:
//!    `FF D8` → JPEG, `89 50 4E 47` → PNG, ASCII `WEBP` at offset 8 → WebP.
//! 2. A decode probe fills in dimensions, alpha and color depth when the codec
//!    accepts the bytes.
//! 3. When the decode probe fails, the leading bytes are scanned for the
//!    `ftyp` marker of an ISO-BMFF container → video, no dimension data.
//! 4. Anything else is `Unknown`.
//!
//! Analysis is best-effort and never fails hard.

use crate::codec::Codec;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Coarse media classification used for pipeline dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Document,
    Unknown,
}

impl MediaKind {
    /// Parses a caller-supplied type label; unknown labels map to `Unknown`.
    pub fn parse(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            "document" => MediaKind::Document,
            _ => MediaKind::Unknown,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Immutable description of an analyzed input.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub kind: MediaKind,
    /// Format label derived from magic bytes or the decode probe.
    pub format: Option<&'static str>,
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    /// Approximate bits per channel (0 when no decode data is available).
    pub color_depth: u8,
    pub aspect_ratio: f64,
    pub file_size: u64,
}

impl MediaAsset {
    fn unknown(file_size: u64) -> Self {
        Self {
            kind: MediaKind::Unknown,
            format: None,
            width: 0,
            height: 0,
            has_alpha: false,
            color_depth: 0,
            aspect_ratio: 0.0,
            file_size,
        }
    }
}

/// Best-effort classifier over the codec collaborator.
pub struct MediaAnalyzer {
    codec: Arc<dyn Codec>,
}

impl MediaAnalyzer {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }

    /// Classifies image bytes by magic signature, independent of decodability.
    pub fn sniff_image_format(bytes: &[u8]) -> Option<&'static str> {
        if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xD8 {
            return Some("JPEG");
        }
        if bytes.len() >= 4 && bytes[..4] == [0x89, 0x50, 0x4E, 0x47] {
            return Some("PNG");
        }
        if bytes.len() >= 12 && &bytes[8..12] == b"WEBP" {
            return Some("WebP");
        }
        None
    }

    /// True when the leading bytes carry the `ftyp` marker of an ISO-BMFF
    /// (MP4/MOV) container.
    pub fn looks_like_video(bytes: &[u8]) -> bool {
        let head = &bytes[..bytes.len().min(12)];
        head.windows(4).any(|w| w == b"ftyp")
    }

    /// Analyzes raw bytes into a [`MediaAsset`]. Never fails; inputs the
    /// probes cannot place come back as `Unknown`.
    pub fn analyze(&self, bytes: &[u8]) -> MediaAsset {
        let file_size = bytes.len() as u64;
        let sniffed = Self::sniff_image_format(bytes);

        match self.codec.decode(bytes) {
            Ok(image) => {
                let color = image.color();
                let asset = MediaAsset {
                    kind: MediaKind::Image,
                    format: sniffed,
                    width: image.width(),
                    height: image.height(),
                    has_alpha: color.has_alpha(),
                    color_depth: (color.bits_per_pixel() / color.channel_count() as u16) as u8,
                    aspect_ratio: image.width() as f64 / image.height() as f64,
                    file_size,
                };
                debug!(
                    "Analyzed image: {}x{} {} alpha={}",
                    asset.width,
                    asset.height,
                    asset.format.unwrap_or("?"),
                    asset.has_alpha
                );
                asset
            }
            Err(_) if sniffed.is_some() => {
                // Recognizable image container the codec could not decode;
                // keep the format label but report no dimension data.
                MediaAsset {
                    kind: MediaKind::Image,
                    format: sniffed,
                    ..MediaAsset::unknown(file_size)
                }
            }
            Err(_) if Self::looks_like_video(bytes) => {
                debug!("Decode probe failed, ftyp marker found: classifying as video");
                MediaAsset {
                    kind: MediaKind::Video,
                    format: Some("MP4"),
                    ..MediaAsset::unknown(file_size)
                }
            }
            Err(_) => MediaAsset::unknown(file_size),
        }
    }
}
