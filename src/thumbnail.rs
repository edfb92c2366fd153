//! # Thumbnail Module
//!
//! Derivative generation for every media kind: image thumbnails, video frame
//! grabs, document placeholders, multi-size sets and video contact sheets.
//!
//! Each media kind has its own [`DerivativeSource`], so the composer only
//! dispatches; video frame access goes through the [`FrameSource`] trait and
//! is mockable in tests.

use crate::analyzer::MediaKind;
use crate::codec::{Codec, StandardCodec};
use crate::encoding::{EncodingPlan, EncodingPlanner, OutputFormat};
use crate::error::MediaError;
use crate::geometry::GeometryPlanner;
use crate::transcoder::{FfmpegTranscoder, FrameRequest, FrameSource};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Options for one derivative.
#[derive(Debug, Clone)]
pub struct ThumbnailOptions {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub format: OutputFormat,
    pub maintain_aspect: bool,
    /// For video sources: where in the stream to grab the frame.
    pub time_offset_secs: u32,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            width: 200,
            height: 200,
            quality: 85,
            format: OutputFormat::Jpeg,
            maintain_aspect: true,
            time_offset_secs: 0,
        }
    }
}

/// Result of one derivative attempt.
#[derive(Debug, Clone)]
pub struct ThumbnailOutcome {
    pub success: bool,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl ThumbnailOutcome {
    fn failed(elapsed_ms: u64, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            width: 0,
            height: 0,
            elapsed_ms,
            error: Some(message.into()),
        }
    }
}

/// Produces derivative bytes for one media kind.
pub trait DerivativeSource: Send + Sync {
    fn produce(&self, bytes: &[u8], options: &ThumbnailOptions) -> Result<Vec<u8>, MediaError>;
}

/// Decode, scale, re-encode. Thumbnails may upscale small sources; the
/// requested box wins.
pub struct ImageThumbnailer {
    codec: Arc<dyn Codec>,
}

impl ImageThumbnailer {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }

    fn scale(&self, image: &DynamicImage, options: &ThumbnailOptions) -> DynamicImage {
        let plan = GeometryPlanner::plan(
            image.width(),
            image.height(),
            options.width,
            options.height,
            options.maintain_aspect,
        );
        if plan.is_noop(image.width(), image.height()) {
            image.clone()
        } else {
            image.resize_exact(plan.target_width, plan.target_height, FilterType::Lanczos3)
        }
    }
}

impl DerivativeSource for ImageThumbnailer {
    fn produce(&self, bytes: &[u8], options: &ThumbnailOptions) -> Result<Vec<u8>, MediaError> {
        let image = self.codec.decode(bytes)?;
        let scaled = self.scale(&image, options);
        let plan = EncodingPlanner::plan(
            Some(options.format),
            options.quality,
            scaled.color().has_alpha(),
            false,
            false,
            false,
        );
        self.codec.encode(&scaled, &plan)
    }
}

/// Grabs a frame from the video stream, already sized by the frame source.
pub struct VideoThumbnailer {
    frames: Arc<dyn FrameSource>,
}

impl VideoThumbnailer {
    pub fn new(frames: Arc<dyn FrameSource>) -> Self {
        Self { frames }
    }
}

impl DerivativeSource for VideoThumbnailer {
    fn produce(&self, bytes: &[u8], options: &ThumbnailOptions) -> Result<Vec<u8>, MediaError> {
        self.frames.extract_frame(
            bytes,
            &FrameRequest {
                width: options.width,
                height: options.height,
                time_offset_secs: options.time_offset_secs,
            },
        )
    }
}

/// Documents get a flat placeholder card with a page glyph; no rendering
/// backend is involved.
pub struct DocumentThumbnailer {
    codec: Arc<dyn Codec>,
}

impl DocumentThumbnailer {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }
}

impl DerivativeSource for DocumentThumbnailer {
    fn produce(&self, _bytes: &[u8], options: &ThumbnailOptions) -> Result<Vec<u8>, MediaError> {
        let mut canvas = RgbImage::from_pixel(
            options.width.max(1),
            options.height.max(1),
            image::Rgb([240, 240, 240]),
        );

        // Darker rectangle in the middle suggesting a page.
        let (w, h) = (canvas.width(), canvas.height());
        let (page_w, page_h) = (w * 3 / 5, h * 7 / 10);
        let (x0, y0) = ((w - page_w) / 2, (h - page_h) / 2);
        for y in y0..y0 + page_h {
            for x in x0..x0 + page_w {
                canvas.put_pixel(x, y, image::Rgb([200, 200, 205]));
            }
        }

        let plan = EncodingPlan {
            format: OutputFormat::Jpeg,
            quality: options.quality.clamp(1, 100),
            progressive: false,
        };
        self.codec.encode(&DynamicImage::ImageRgb8(canvas), &plan)
    }
}

/// Grid layout for a contact sheet.
#[derive(Debug, Clone, Copy)]
pub struct SheetLayout {
    pub grid_width: u32,
    pub grid_height: u32,
    /// Seconds between sampled frames.
    pub frame_interval_secs: u32,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            grid_width: 3,
            grid_height: 3,
            frame_interval_secs: 10,
        }
    }
}

/// Front door for derivative generation. Routes by media kind and owns the
/// contact-sheet compositor.
pub struct ThumbnailComposer {
    codec: Arc<dyn Codec>,
    image: ImageThumbnailer,
    video: VideoThumbnailer,
    document: DocumentThumbnailer,
    frames: Arc<dyn FrameSource>,
}

impl Default for ThumbnailComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbnailComposer {
    pub fn new() -> Self {
        Self::with_parts(Arc::new(StandardCodec::new()), Arc::new(FfmpegTranscoder::new()))
    }

    pub fn with_parts(codec: Arc<dyn Codec>, frames: Arc<dyn FrameSource>) -> Self {
        Self {
            image: ImageThumbnailer::new(codec.clone()),
            video: VideoThumbnailer::new(frames.clone()),
            document: DocumentThumbnailer::new(codec.clone()),
            codec,
            frames,
        }
    }

    fn source_for(&self, kind: MediaKind) -> Option<&dyn DerivativeSource> {
        match kind {
            MediaKind::Image => Some(&self.image),
            MediaKind::Video => Some(&self.video),
            MediaKind::Document => Some(&self.document),
            MediaKind::Unknown => None,
        }
    }

    /// One derivative for one asset.
    pub fn single(
        &self,
        bytes: &[u8],
        kind: MediaKind,
        options: &ThumbnailOptions,
    ) -> ThumbnailOutcome {
        let start = Instant::now();
        let source = match self.source_for(kind) {
            Some(source) => source,
            None => {
                return ThumbnailOutcome::failed(
                    start.elapsed().as_millis() as u64,
                    MediaError::UnsupportedMediaType(kind.to_string()).to_string(),
                )
            }
        };

        match source.produce(bytes, options) {
            Ok(data) => ThumbnailOutcome {
                success: true,
                data,
                width: options.width,
                height: options.height,
                elapsed_ms: start.elapsed().as_millis() as u64,
                error: None,
            },
            Err(e) => {
                warn!("Thumbnail generation failed: {}", e);
                ThumbnailOutcome::failed(start.elapsed().as_millis() as u64, e.to_string())
            }
        }
    }

    /// One derivative per requested size, in the order given. Failures do not
    /// stop the remaining sizes.
    pub fn multi_size(
        &self,
        bytes: &[u8],
        kind: MediaKind,
        sizes: &[(u32, u32)],
    ) -> Vec<ThumbnailOutcome> {
        sizes
            .iter()
            .map(|&(width, height)| {
                let options = ThumbnailOptions {
                    width,
                    height,
                    ..Default::default()
                };
                self.single(bytes, kind, &options)
            })
            .collect()
    }

    /// Composes a grid of frames sampled across a video.
    ///
    /// Frame `i` is taken at `i * frame_interval_secs` and placed at row
    /// `i / grid_width`, column `i % grid_width`. A frame that cannot be
    /// extracted leaves its cell on the white background; the sheet itself
    /// still succeeds.
    pub fn contact_sheet(
        &self,
        video: &[u8],
        options: &ThumbnailOptions,
        layout: &SheetLayout,
    ) -> ThumbnailOutcome {
        let start = Instant::now();
        if layout.grid_width == 0 || layout.grid_height == 0 {
            return ThumbnailOutcome::failed(
                start.elapsed().as_millis() as u64,
                "contact sheet grid must be at least 1x1",
            );
        }

        let cell_w = (options.width / layout.grid_width).max(1);
        let cell_h = (options.height / layout.grid_height).max(1);
        let mut canvas = RgbImage::from_pixel(
            options.width.max(1),
            options.height.max(1),
            image::Rgb([255, 255, 255]),
        );

        let total = layout.grid_width * layout.grid_height;
        for i in 0..total {
            let request = FrameRequest {
                width: cell_w,
                height: cell_h,
                time_offset_secs: i * layout.frame_interval_secs,
            };
            let frame = match self.frames.extract_frame(video, &request) {
                Ok(frame) => frame,
                Err(e) => {
                    debug!("Sheet frame {} unavailable: {}", i, e);
                    continue;
                }
            };
            let decoded = match self.codec.decode(&frame) {
                Ok(decoded) => decoded,
                Err(e) => {
                    debug!("Sheet frame {} undecodable: {}", i, e);
                    continue;
                }
            };
            let cell = decoded
                .resize_exact(cell_w, cell_h, FilterType::Lanczos3)
                .to_rgb8();

            let col = i % layout.grid_width;
            let row = i / layout.grid_width;
            imageops::replace(&mut canvas, &cell, (col * cell_w) as i64, (row * cell_h) as i64);
        }

        let plan = EncodingPlan {
            format: OutputFormat::Jpeg,
            quality: options.quality.clamp(1, 100),
            progressive: false,
        };
        match self.codec.encode(&DynamicImage::ImageRgb8(canvas), &plan) {
            Ok(data) => ThumbnailOutcome {
                success: true,
                data,
                width: options.width,
                height: options.height,
                elapsed_ms: start.elapsed().as_millis() as u64,
                error: None,
            },
            Err(e) => ThumbnailOutcome::failed(start.elapsed().as_millis() as u64, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frame source yielding solid-color JPEG frames keyed by offset, with an
    /// optional offset that always fails.
    struct FakeFrames {
        fail_at_offset: Option<u32>,
    }

    impl FrameSource for FakeFrames {
        fn extract_frame(
            &self,
            _video: &[u8],
            request: &FrameRequest,
        ) -> Result<Vec<u8>, MediaError> {
            if Some(request.time_offset_secs) == self.fail_at_offset {
                return Err(MediaError::ExternalTool("no frame there".to_string()));
            }
            let shade = (request.time_offset_secs % 200) as u8 + 20;
            let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(
                request.width,
                request.height,
                image::Rgb([shade, shade, shade]),
            ));
            let plan = EncodingPlan {
                format: OutputFormat::Jpeg,
                quality: 90,
                progressive: false,
            };
            StandardCodec::new().encode(&image, &plan)
        }
    }

    fn composer(fail_at_offset: Option<u32>) -> ThumbnailComposer {
        ThumbnailComposer::with_parts(
            Arc::new(StandardCodec::new()),
            Arc::new(FakeFrames { fail_at_offset }),
        )
    }

    fn sample_png() -> Vec<u8> {
        let image =
            DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 240, image::Rgb([60, 120, 180])));
        let plan = EncodingPlan {
            format: OutputFormat::Png,
            quality: 6,
            progressive: false,
        };
        StandardCodec::new().encode(&image, &plan).unwrap()
    }

    #[test]
    fn test_image_thumbnail_respects_aspect() {
        let composer = composer(None);
        let options = ThumbnailOptions {
            width: 100,
            height: 100,
            ..Default::default()
        };
        let outcome = composer.single(&sample_png(), MediaKind::Image, &options);
        assert!(outcome.success, "{:?}", outcome.error);

        let produced = image::load_from_memory(&outcome.data).unwrap();
        // 320x240 into a 100x100 box keeps 4:3
        assert_eq!((produced.width(), produced.height()), (100, 75));
    }

    #[test]
    fn test_image_thumbnail_may_upscale() {
        let composer = composer(None);
        let small = {
            let image =
                DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 20, image::Rgb([1, 2, 3])));
            let plan = EncodingPlan {
                format: OutputFormat::Png,
                quality: 6,
                progressive: false,
            };
            StandardCodec::new().encode(&image, &plan).unwrap()
        };
        let options = ThumbnailOptions {
            width: 80,
            height: 80,
            ..Default::default()
        };
        let outcome = composer.single(&small, MediaKind::Image, &options);
        assert!(outcome.success);
        let produced = image::load_from_memory(&outcome.data).unwrap();
        assert_eq!((produced.width(), produced.height()), (80, 80));
    }

    #[test]
    fn test_video_thumbnail_uses_frame_source() {
        let composer = composer(None);
        let options = ThumbnailOptions {
            width: 160,
            height: 90,
            time_offset_secs: 5,
            ..Default::default()
        };
        let outcome = composer.single(b"not-a-real-video", MediaKind::Video, &options);
        assert!(outcome.success);
        let produced = image::load_from_memory(&outcome.data).unwrap();
        assert_eq!((produced.width(), produced.height()), (160, 90));
    }

    #[test]
    fn test_document_placeholder() {
        let composer = composer(None);
        let outcome = composer.single(
            b"%PDF-1.7 ...",
            MediaKind::Document,
            &ThumbnailOptions::default(),
        );
        assert!(outcome.success);
        let produced = image::load_from_memory(&outcome.data).unwrap();
        assert_eq!((produced.width(), produced.height()), (200, 200));
    }

    #[test]
    fn test_unknown_kind_fails_cleanly() {
        let composer = composer(None);
        let outcome = composer.single(b"????", MediaKind::Unknown, &ThumbnailOptions::default());
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_multi_size_preserves_order() {
        let composer = composer(None);
        let sizes = [(64, 64), (128, 128), (32, 32)];
        let outcomes = composer.multi_size(&sample_png(), MediaKind::Image, &sizes);
        assert_eq!(outcomes.len(), 3);
        for (outcome, (w, h)) in outcomes.iter().zip(sizes) {
            assert!(outcome.success);
            assert_eq!((outcome.width, outcome.height), (w, h));
        }
    }

    #[test]
    fn test_contact_sheet_grid_and_offsets() {
        let composer = composer(None);
        let options = ThumbnailOptions {
            width: 300,
            height: 300,
            ..Default::default()
        };
        let outcome = composer.contact_sheet(b"video", &options, &SheetLayout::default());
        assert!(outcome.success, "{:?}", outcome.error);

        let sheet = image::load_from_memory(&outcome.data).unwrap().to_rgb8();
        assert_eq!((sheet.width(), sheet.height()), (300, 300));
        // Frame 4 sits at row 1, col 1 and was sampled at 40s → shade 60.
        let px = sheet.get_pixel(150, 150);
        assert!((px[0] as i16 - 60).abs() < 12, "center cell shade {:?}", px);
    }

    #[test]
    fn test_contact_sheet_survives_missing_frame() {
        // Frame at 80s (last cell of a 3x3 grid) fails.
        let composer = composer(Some(80));
        let options = ThumbnailOptions {
            width: 300,
            height: 300,
            ..Default::default()
        };
        let outcome = composer.contact_sheet(b"video", &options, &SheetLayout::default());
        assert!(outcome.success);

        let sheet = image::load_from_memory(&outcome.data).unwrap().to_rgb8();
        // Missing cell keeps the white background.
        let px = sheet.get_pixel(250, 250);
        assert!(px[0] > 230, "expected background, got {:?}", px);
    }

    #[test]
    fn test_contact_sheet_rejects_zero_grid() {
        let composer = composer(None);
        let layout = SheetLayout {
            grid_width: 0,
            grid_height: 3,
            frame_interval_secs: 10,
        };
        let outcome = composer.contact_sheet(b"video", &ThumbnailOptions::default(), &layout);
        assert!(!outcome.success);
    }
}
