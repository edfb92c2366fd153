//! # Mediaflow Library
//!
//! In-memory media optimization engine: bytes in, optimized bytes plus a
//! structured outcome out.
//!
//! ## Architettura dei moduli:
//! - `analyzer`: Content sniffing and media classification
//! - `geometry`: Pure resize planning
//! - `encoding`: Output format and encoder parameter planning
//! - `codec`: Decode/encode backend (JPEG/PNG/WebP)
//! - `search`: Quality ladder for size budgets
//! - `profile`: Optimization profiles and target-use selection
//! - `optimizer`: Pipeline, batch fan-out and bounded video jobs
//! - `transcoder`: ffmpeg/ffprobe boundary for video streams
//! - `thumbnail`: Derivatives, multi-size sets and contact sheets
//! - `progress`: Progress tracking and batch statistics
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use mediaflow::{MediaPipeline, OptimizationProfile};
//!
//! # async fn run(bytes: &[u8]) {
//! let pipeline = MediaPipeline::new();
//! let kind = pipeline.analyze(bytes).kind;
//! let outcome = pipeline
//!     .optimize(bytes, kind, &OptimizationProfile::default())
//!     .await;
//! # }
//! ```

pub mod analyzer;
pub mod codec;
pub mod encoding;
pub mod error;
pub mod geometry;
pub mod optimizer;
pub mod profile;
pub mod progress;
pub mod search;
pub mod thumbnail;
pub mod transcoder;

pub use analyzer::{MediaAnalyzer, MediaAsset, MediaKind};
pub use codec::{Codec, StandardCodec};
pub use encoding::{EncodingPlan, EncodingPlanner, OutputFormat};
pub use error::MediaError;
pub use geometry::{GeometryPlan, GeometryPlanner};
pub use optimizer::{BatchOrchestrator, BoundedJobRunner, MediaPipeline, OptimizationOutcome};
pub use profile::{OptimizationProfile, ProfileSelector, TargetUse};
pub use search::{SizeConstraintSearch, SearchResult};
pub use thumbnail::{SheetLayout, ThumbnailComposer, ThumbnailOptions, ThumbnailOutcome};
pub use transcoder::{FfmpegTranscoder, FrameSource, TranscodeOptions, VideoStreamInfo};
