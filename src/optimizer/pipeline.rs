//! # Optimization Pipeline Module
//!
//! Single-asset orchestration: analyze the input, plan geometry and encoding,
//! run the size-constrained search and report a structured outcome. The
//! pipeline never panics on bad input; malformed media comes back as a failed
//! outcome with a message.
//!
//! ## Sizing policy
//! Dimension caps shrink, never grow. An image already inside the profile's
//! bounds keeps its geometry; only the exceeded axis is capped and the other
//! follows the aspect ratio.
//!
//! ## Video path
//! Videos are delegated to the external transcoder with a bitrate derived
//! from the size budget and the probed duration (60s fallback when probing
//! fails).

use crate::analyzer::{MediaAnalyzer, MediaAsset, MediaKind};
use crate::codec::{Codec, StandardCodec};
use crate::encoding::{EncodingPlanner, OutputFormat};
use crate::error::MediaError;
use crate::geometry::GeometryPlanner;
use crate::profile::{OptimizationProfile, ProfileSelector, TargetUse};
use crate::search::SizeConstraintSearch;
use crate::transcoder::{FfmpegTranscoder, TranscodeOptions};
use image::imageops::FilterType;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Result of one optimization attempt.
///
/// Failures are data, not panics: a failed outcome carries `success = false`,
/// an error message and the untouched original size.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub success: bool,
    pub data: Vec<u8>,
    pub format: Option<OutputFormat>,
    pub width: u32,
    pub height: u32,
    pub original_size: u64,
    pub optimized_size: u64,
    /// original / optimized; 1.0 when nothing was produced
    pub compression_ratio: f64,
    pub iterations: u32,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl OptimizationOutcome {
    pub fn failed(original_size: u64, elapsed_ms: u64, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            format: None,
            width: 0,
            height: 0,
            original_size,
            optimized_size: 0,
            compression_ratio: 1.0,
            iterations: 0,
            elapsed_ms,
            error: Some(message.into()),
        }
    }

    pub fn savings_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.optimized_size as f64 / self.original_size as f64) * 100.0
    }
}

/// Orchestrates analysis, planning, encoding and the size search for a
/// single asset.
pub struct MediaPipeline {
    codec: Arc<dyn Codec>,
    analyzer: MediaAnalyzer,
    transcoder: Arc<FfmpegTranscoder>,
}

impl Default for MediaPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaPipeline {
    pub fn new() -> Self {
        Self::with_codec(Arc::new(StandardCodec::new()))
    }

    /// Builds a pipeline around a caller-supplied codec, used by tests to
    /// substitute deterministic encoders.
    pub fn with_codec(codec: Arc<dyn Codec>) -> Self {
        Self {
            codec: codec.clone(),
            analyzer: MediaAnalyzer::new(codec),
            transcoder: Arc::new(FfmpegTranscoder::new()),
        }
    }

    /// Inspects bytes and reports what they are. Never errors.
    pub fn analyze(&self, input: &[u8]) -> MediaAsset {
        self.analyzer.analyze(input)
    }

    /// Optimizes one asset of a declared kind against an explicit profile.
    pub async fn optimize(
        &self,
        input: &[u8],
        kind: MediaKind,
        profile: &OptimizationProfile,
    ) -> OptimizationOutcome {
        let start = Instant::now();
        let original_size = input.len() as u64;

        if let Err(e) = profile.validate() {
            return OptimizationOutcome::failed(
                original_size,
                start.elapsed().as_millis() as u64,
                e.to_string(),
            );
        }

        match kind {
            MediaKind::Image => self.optimize_image(input, profile, start).await,
            MediaKind::Video => self.optimize_video(input, profile, start).await,
            MediaKind::Document | MediaKind::Unknown => {
                warn!("No optimization path for media kind: {}", kind);
                OptimizationOutcome::failed(
                    original_size,
                    start.elapsed().as_millis() as u64,
                    MediaError::UnsupportedMediaType(kind.to_string()).to_string(),
                )
            }
        }
    }

    /// Analyzes the asset, selects a profile for the target use, then
    /// optimizes with it.
    pub async fn smart_optimize(&self, input: &[u8], target_use: TargetUse) -> OptimizationOutcome {
        let asset = self.analyzer.analyze(input);
        let profile = ProfileSelector::select(&asset, target_use);
        debug!(
            "Selected profile for {:?}: quality={} max={}x{} budget={}KB",
            target_use, profile.target_quality, profile.max_width, profile.max_height,
            profile.max_file_size_kb
        );
        self.optimize(input, asset.kind, &profile).await
    }

    /// Produces one outcome per quality level, progressive encoding on.
    /// Levels are processed in the order given and failures do not stop the
    /// remaining levels.
    pub async fn generate_progressive(
        &self,
        input: &[u8],
        levels: &[u8],
        base: &OptimizationProfile,
    ) -> Vec<OptimizationOutcome> {
        let kind = self.analyzer.analyze(input).kind;
        let mut outcomes = Vec::with_capacity(levels.len());
        for &quality in levels {
            let profile = OptimizationProfile {
                target_quality: quality,
                progressive_required: true,
                ..base.clone()
            };
            outcomes.push(self.optimize(input, kind, &profile).await);
        }
        outcomes
    }

    /// Hands a video stream to the external transcoder.
    pub async fn transform_video(
        &self,
        input: &[u8],
        options: &TranscodeOptions,
        stop: Option<broadcast::Receiver<()>>,
    ) -> Result<Vec<u8>, MediaError> {
        self.transcoder.transcode(input, options, stop).await
    }

    async fn optimize_image(
        &self,
        input: &[u8],
        profile: &OptimizationProfile,
        start: Instant,
    ) -> OptimizationOutcome {
        let original_size = input.len() as u64;

        let image = match self.codec.decode(input) {
            Ok(image) => image,
            Err(e) => {
                return OptimizationOutcome::failed(
                    original_size,
                    start.elapsed().as_millis() as u64,
                    e.to_string(),
                )
            }
        };

        let (width, height) = (image.width(), image.height());

        // Caps only apply to the axis they exceed; never upscale.
        let requested_w = if profile.max_width > 0 && width > profile.max_width {
            profile.max_width
        } else {
            0
        };
        let requested_h = if profile.max_height > 0 && height > profile.max_height {
            profile.max_height
        } else {
            0
        };

        let plan = GeometryPlanner::plan(width, height, requested_w, requested_h, profile.preserve_aspect);
        let image = if plan.is_noop(width, height) {
            image
        } else {
            debug!(
                "Resizing {}x{} -> {}x{}",
                width, height, plan.target_width, plan.target_height
            );
            image.resize_exact(plan.target_width, plan.target_height, FilterType::Lanczos3)
        };

        let has_alpha = image.color().has_alpha();
        let encoding = EncodingPlanner::plan(
            None,
            profile.target_quality,
            has_alpha,
            profile.lossless_required,
            profile.progressive_required,
            profile.prefer_web_format,
        );

        let result = match SizeConstraintSearch::run(
            self.codec.as_ref(),
            &image,
            &encoding,
            profile.max_bytes(),
        ) {
            Ok(result) => result,
            Err(e) => {
                return OptimizationOutcome::failed(
                    original_size,
                    start.elapsed().as_millis() as u64,
                    e.to_string(),
                )
            }
        };

        let success = result.within_budget || !profile.strict_size_budget;
        if !result.within_budget {
            warn!(
                "Size budget missed: {} bytes against {} KB budget at quality {}",
                result.data.len(),
                profile.max_file_size_kb,
                result.quality_used
            );
        }

        let optimized_size = result.data.len() as u64;
        let compression_ratio = if optimized_size > 0 {
            original_size as f64 / optimized_size as f64
        } else {
            1.0
        };

        info!(
            "Optimized image: {} -> {} bytes ({:.1}% savings) in {} pass(es)",
            original_size,
            optimized_size,
            (1.0 - optimized_size as f64 / original_size.max(1) as f64) * 100.0,
            result.iterations
        );

        OptimizationOutcome {
            success,
            error: if success {
                None
            } else {
                Some(format!(
                    "result exceeds {} KB size budget",
                    profile.max_file_size_kb
                ))
            },
            data: result.data,
            format: Some(encoding.format),
            width: image.width(),
            height: image.height(),
            original_size,
            optimized_size,
            compression_ratio,
            iterations: result.iterations,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn optimize_video(
        &self,
        input: &[u8],
        profile: &OptimizationProfile,
        start: Instant,
    ) -> OptimizationOutcome {
        let original_size = input.len() as u64;

        // Derive the target bitrate from the byte budget over the probed
        // duration; probing failures fall back to a 60s assumption.
        let probed = match self.transcoder.probe(input).await {
            Ok(info) if info.duration > 0.0 => Some(info),
            Ok(_) => None,
            Err(e) => {
                debug!("Probe failed, assuming 60s: {}", e);
                None
            }
        };
        let duration = probed.as_ref().map(|info| info.duration).unwrap_or(60.0);

        let bitrate_kbps = if profile.max_file_size_kb > 0 {
            ((profile.max_file_size_kb as f64 * 8.0) / duration).max(100.0) as u32
        } else {
            2000
        };
        if let Some(info) = &probed {
            debug!(
                "Transcoding {}s {} stream at {} kbps, estimated {} bytes",
                info.duration,
                info.codec,
                bitrate_kbps,
                info.estimate_size(bitrate_kbps)
            );
        }

        let options = TranscodeOptions {
            target_width: profile.max_width,
            target_height: profile.max_height,
            maintain_aspect: profile.preserve_aspect,
            bitrate_kbps,
            ..Default::default()
        };

        match self.transcoder.transcode(input, &options, None).await {
            Ok(data) => {
                let optimized_size = data.len() as u64;
                let within_budget =
                    profile.max_bytes() == 0 || optimized_size <= profile.max_bytes();
                let success = within_budget || !profile.strict_size_budget;
                OptimizationOutcome {
                    success,
                    error: if success {
                        None
                    } else {
                        Some(format!(
                            "result exceeds {} KB size budget",
                            profile.max_file_size_kb
                        ))
                    },
                    compression_ratio: if optimized_size > 0 {
                        original_size as f64 / optimized_size as f64
                    } else {
                        1.0
                    },
                    data,
                    format: None,
                    width: profile.max_width,
                    height: profile.max_height,
                    original_size,
                    optimized_size,
                    iterations: 1,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                }
            }
            Err(e) => OptimizationOutcome::failed(
                original_size,
                start.elapsed().as_millis() as u64,
                e.to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage, RgbaImage};

    fn solid_jpeg(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120, 90, 60]),
        ));
        let codec = StandardCodec::new();
        let plan = crate::encoding::EncodingPlan {
            format: OutputFormat::Jpeg,
            quality: 90,
            progressive: false,
        };
        codec.encode(&image, &plan).unwrap()
    }

    #[tokio::test]
    async fn test_optimize_caps_oversized_image() {
        let pipeline = MediaPipeline::new();
        let input = solid_jpeg(400, 300);
        let profile = OptimizationProfile {
            max_width: 200,
            max_height: 200,
            ..Default::default()
        };

        let outcome = pipeline.optimize(&input, MediaKind::Image, &profile).await;
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.width, 200);
        assert_eq!(outcome.height, 150);
        assert!(outcome.optimized_size > 0);
        assert!(outcome.compression_ratio > 0.0);
    }

    #[tokio::test]
    async fn test_optimize_never_upscales() {
        let pipeline = MediaPipeline::new();
        let input = solid_jpeg(100, 80);
        let profile = OptimizationProfile {
            max_width: 1920,
            max_height: 1080,
            ..Default::default()
        };

        let outcome = pipeline.optimize(&input, MediaKind::Image, &profile).await;
        assert!(outcome.success);
        assert_eq!((outcome.width, outcome.height), (100, 80));
    }

    #[tokio::test]
    async fn test_optimize_rejects_garbage_without_panicking() {
        let pipeline = MediaPipeline::new();
        let outcome = pipeline
            .optimize(&[0u8; 64], MediaKind::Image, &OptimizationProfile::default())
            .await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert_eq!(outcome.original_size, 64);
    }

    #[tokio::test]
    async fn test_optimize_rejects_kinds_without_a_path() {
        let pipeline = MediaPipeline::new();
        let input = solid_jpeg(32, 32);
        for kind in [MediaKind::Document, MediaKind::Unknown] {
            let outcome = pipeline
                .optimize(&input, kind, &OptimizationProfile::default())
                .await;
            assert!(!outcome.success);
            assert!(outcome
                .error
                .as_deref()
                .unwrap_or_default()
                .contains("Unsupported media type"));
        }
    }

    #[tokio::test]
    async fn test_optimize_rejects_invalid_profile() {
        let pipeline = MediaPipeline::new();
        let input = solid_jpeg(32, 32);
        let profile = OptimizationProfile {
            target_quality: 0,
            ..Default::default()
        };
        let outcome = pipeline.optimize(&input, MediaKind::Image, &profile).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_budget_miss_is_success_unless_strict() {
        let pipeline = MediaPipeline::new();
        // Noisy image so even quality 10 cannot reach a 1 KB budget.
        let mut noisy = RgbImage::new(256, 256);
        for (x, y, px) in noisy.enumerate_pixels_mut() {
            *px = image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8]);
        }
        let codec = StandardCodec::new();
        let plan = crate::encoding::EncodingPlan {
            format: OutputFormat::Png,
            quality: 100,
            progressive: false,
        };
        let input = codec.encode(&DynamicImage::ImageRgb8(noisy), &plan).unwrap();

        let lenient = OptimizationProfile {
            max_file_size_kb: 1,
            ..Default::default()
        };
        let outcome = pipeline.optimize(&input, MediaKind::Image, &lenient).await;
        assert!(outcome.success);
        assert!(!outcome.data.is_empty());

        let strict = OptimizationProfile {
            max_file_size_kb: 1,
            strict_size_budget: true,
            ..Default::default()
        };
        let outcome = pipeline.optimize(&input, MediaKind::Image, &strict).await;
        assert!(!outcome.success);
        // Best-effort bytes are still reported
        assert!(!outcome.data.is_empty());
    }

    #[tokio::test]
    async fn test_smart_optimize_keeps_alpha_out_of_jpeg() {
        let pipeline = MediaPipeline::new();
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            64,
            64,
            image::Rgba([10, 20, 30, 128]),
        ));
        let codec = StandardCodec::new();
        let plan = crate::encoding::EncodingPlan {
            format: OutputFormat::Png,
            quality: 100,
            progressive: false,
        };
        let input = codec.encode(&image, &plan).unwrap();

        let outcome = pipeline.smart_optimize(&input, TargetUse::Web).await;
        assert!(outcome.success);
        assert_ne!(outcome.format, Some(OutputFormat::Jpeg));
    }

    #[tokio::test]
    async fn test_generate_progressive_one_outcome_per_level() {
        let pipeline = MediaPipeline::new();
        let input = solid_jpeg(120, 120);
        let outcomes = pipeline
            .generate_progressive(&input, &[90, 60, 30], &OptimizationProfile::default())
            .await;
        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes {
            assert!(outcome.success);
            assert!(!outcome.data.is_empty());
        }
    }

    #[test]
    fn test_failed_outcome_shape() {
        let outcome = OptimizationOutcome::failed(1024, 5, "boom");
        assert!(!outcome.success);
        assert_eq!(outcome.original_size, 1024);
        assert_eq!(outcome.compression_ratio, 1.0);
        assert_eq!(outcome.savings_percent(), 100.0);
        assert_eq!(outcome.error.as_deref(), Some("boom"));
    }
}
