//! # External Transcoder Module
//!
//! Boundary to the external video tool (ffmpeg/ffprobe). The core never
//! parses or rewrites video streams itself; it hands bytes to the tool via
//! per-invocation temporary files and gets bytes plus a pass/fail signal back
//! (the tool reports no structured error detail).
//!
//! ## Temp-file ownership
//! Every invocation acquires its own scoped temp directory; the directory is
//! released on every exit path, including errors, when the handle drops. No
//! ambient process-wide temp naming is used.
//!
//! ## Cancellation
//! [`FfmpegTranscoder::transcode`] optionally listens on a broadcast stop
//! channel. When the signal fires the spawned process is killed, so a bounded
//! job's timeout actually stops the external work instead of letting it run
//! on in the background.
//!
//! ## Option set
//! One structured option set covers the whole transform surface: target
//! dimensions, bitrate, codec label, framerate, audio codec/bitrate, time
//! offset, duration and watermark overlay position.

use crate::error::MediaError;
use std::path::Path;
use std::process::Stdio;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Corner placement for a watermark overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl OverlayPosition {
    /// ffmpeg overlay filter expression with a 10px margin.
    fn filter_expr(&self) -> &'static str {
        match self {
            OverlayPosition::TopLeft => "overlay=10:10",
            OverlayPosition::TopRight => "overlay=main_w-overlay_w-10:10",
            OverlayPosition::BottomLeft => "overlay=10:main_h-overlay_h-10",
            OverlayPosition::BottomRight => "overlay=main_w-overlay_w-10:main_h-overlay_h-10",
        }
    }
}

/// Structured options for one transcode invocation.
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    /// Target width in pixels (0 = keep source)
    pub target_width: u32,
    /// Target height in pixels (0 = keep source)
    pub target_height: u32,
    /// Fit inside the target box, padding instead of stretching
    pub maintain_aspect: bool,
    /// Video bitrate in kbps
    pub bitrate_kbps: u32,
    /// Video codec label: h264, h265 or vp9
    pub codec: String,
    /// Output framerate
    pub framerate: u32,
    /// Audio codec label: aac or mp3
    pub audio_codec: String,
    /// Audio bitrate in kbps
    pub audio_bitrate_kbps: u32,
    /// Seek offset before reading input, in seconds
    pub time_offset_secs: Option<u32>,
    /// Output duration cap, in seconds
    pub duration_secs: Option<u32>,
    /// Watermark image bytes and corner placement
    pub overlay: Option<(Vec<u8>, OverlayPosition)>,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            target_width: 0,
            target_height: 0,
            maintain_aspect: true,
            bitrate_kbps: 2000,
            codec: "h264".to_string(),
            framerate: 30,
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: 128,
            time_offset_secs: None,
            duration_secs: None,
            overlay: None,
        }
    }
}

/// Request for a single still frame out of a video stream.
#[derive(Debug, Clone, Copy)]
pub struct FrameRequest {
    pub width: u32,
    pub height: u32,
    pub time_offset_secs: u32,
}

/// Frame-extraction capability, kept as a trait so composition can be tested
/// without the external tool.
pub trait FrameSource: Send + Sync {
    /// Extracts one frame as encoded image bytes.
    fn extract_frame(&self, video: &[u8], request: &FrameRequest) -> Result<Vec<u8>, MediaError>;
}

/// Basic stream facts parsed out of ffprobe.
#[derive(Debug, Clone)]
pub struct VideoStreamInfo {
    pub duration: f64,
    pub bitrate: u64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

impl VideoStreamInfo {
    /// Estimate output size at a target bitrate, in bytes.
    pub fn estimate_size(&self, target_bitrate_kbps: u32) -> u64 {
        ((target_bitrate_kbps as f64 * 1000.0 * self.duration) / 8.0) as u64
    }
}

/// ffmpeg-backed transcoder collaborator.
#[derive(Debug, Default)]
pub struct FfmpegTranscoder;

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self
    }

    fn workdir(prefix: &str) -> Result<TempDir, MediaError> {
        Ok(tempfile::Builder::new().prefix(prefix).tempdir()?)
    }

    /// Assembles the ffmpeg argument list for a transcode.
    fn build_args(input: &Path, output: &Path, options: &TranscodeOptions) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into()];

        if let Some(offset) = options.time_offset_secs {
            args.push("-ss".into());
            args.push(offset.to_string());
        }

        args.push("-i".into());
        args.push(input.to_string_lossy().into_owned());

        let has_overlay = options.overlay.is_some();
        if let Some((_, position)) = &options.overlay {
            args.push("-i".into());
            args.push(
                input
                    .with_file_name("watermark.png")
                    .to_string_lossy()
                    .into_owned(),
            );
            args.push("-filter_complex".into());
            args.push(position.filter_expr().into());
        }

        match options.codec.as_str() {
            "h265" => args.extend(["-c:v".into(), "libx265".into(), "-preset".into(), "medium".into()]),
            "vp9" => args.extend(["-c:v".into(), "libvpx-vp9".into()]),
            _ => args.extend(["-c:v".into(), "libx264".into(), "-preset".into(), "medium".into()]),
        }

        args.push("-b:v".into());
        args.push(format!("{}k", options.bitrate_kbps));
        args.push("-r".into());
        args.push(options.framerate.to_string());

        // Scaling and overlay filters would collide; overlay wins and keeps
        // the source geometry, matching the watermark path of the original tool.
        if !has_overlay && options.target_width > 0 && options.target_height > 0 {
            if options.maintain_aspect {
                args.push("-vf".into());
                args.push(format!(
                    "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
                    w = options.target_width,
                    h = options.target_height
                ));
            } else {
                args.push("-s".into());
                args.push(format!("{}x{}", options.target_width, options.target_height));
            }
        }

        match options.audio_codec.as_str() {
            "mp3" => args.extend(["-c:a".into(), "libmp3lame".into()]),
            _ => args.extend(["-c:a".into(), "aac".into()]),
        }
        args.push("-b:a".into());
        args.push(format!("{}k", options.audio_bitrate_kbps));

        if let Some(duration) = options.duration_secs {
            args.push("-t".into());
            args.push(duration.to_string());
        }

        args.push("-loglevel".into());
        args.push("warning".into());
        args.push(output.to_string_lossy().into_owned());
        args
    }

    /// Rewrites a video stream according to `options`.
    ///
    /// When `stop` is provided and fires mid-run, the spawned process is
    /// killed and a `Timeout` error is returned.
    pub async fn transcode(
        &self,
        input: &[u8],
        options: &TranscodeOptions,
        stop: Option<broadcast::Receiver<()>>,
    ) -> Result<Vec<u8>, MediaError> {
        let workdir = Self::workdir("mediaflow-transcode-")?;
        let input_path = workdir.path().join("input.mp4");
        let output_path = workdir.path().join("output.mp4");

        tokio::fs::write(&input_path, input).await?;
        if let Some((watermark, _)) = &options.overlay {
            tokio::fs::write(workdir.path().join("watermark.png"), watermark).await?;
        }

        let args = Self::build_args(&input_path, &output_path, options);
        debug!("Running ffmpeg transcode: {:?}", args);

        let start = std::time::Instant::now();
        let mut child = tokio::process::Command::new("ffmpeg")
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::ExternalTool(format!("Failed to spawn ffmpeg: {}", e)))?;

        let status = if let Some(mut stop) = stop {
            tokio::select! {
                status = child.wait() => status?,
                _ = stop.recv() => {
                    warn!("Stop signal received, killing ffmpeg after {:?}", start.elapsed());
                    let _ = child.kill().await;
                    return Err(MediaError::Timeout("transcode cancelled".to_string()));
                }
            }
        } else {
            child.wait().await?
        };

        if !status.success() {
            return Err(MediaError::ExternalTool(format!(
                "ffmpeg exited with {} after {:?}",
                status,
                start.elapsed()
            )));
        }

        debug!("✅ Transcode completed in {:?}", start.elapsed());
        Ok(tokio::fs::read(&output_path).await?)
        // workdir drops here, removing both temp files
    }

    /// Probes basic stream facts with ffprobe.
    pub async fn probe(&self, input: &[u8]) -> Result<VideoStreamInfo, MediaError> {
        let workdir = Self::workdir("mediaflow-probe-")?;
        let input_path = workdir.path().join("input.mp4");
        tokio::fs::write(&input_path, input).await?;

        let output = tokio::process::Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(&input_path)
            .output()
            .await
            .map_err(|e| MediaError::ExternalTool(format!("Failed to execute ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(MediaError::ExternalTool(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let info: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| MediaError::ExternalTool(format!("Unreadable ffprobe output: {}", e)))?;

        let format = &info["format"];
        let duration = format["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);
        let bitrate = format["bit_rate"]
            .as_str()
            .and_then(|b| b.parse::<u64>().ok())
            .unwrap_or(0);

        let empty = vec![];
        let streams = info["streams"].as_array().unwrap_or(&empty);
        let video_stream = streams
            .iter()
            .find(|s| s["codec_type"] == "video")
            .unwrap_or(&serde_json::Value::Null);

        Ok(VideoStreamInfo {
            duration,
            bitrate,
            width: video_stream["width"].as_u64().unwrap_or(0) as u32,
            height: video_stream["height"].as_u64().unwrap_or(0) as u32,
            codec: video_stream["codec_name"].as_str().unwrap_or("unknown").to_string(),
        })
    }

    /// Check that the required external tools are on the path
    pub async fn check_dependencies() -> Result<(), MediaError> {
        for tool in ["ffmpeg", "ffprobe"] {
            let available = tokio::process::Command::new(tool)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(|s| s.success())
                .unwrap_or(false);

            if !available {
                return Err(MediaError::MissingDependency(format!(
                    "{} is required for video processing",
                    tool
                )));
            }
        }
        Ok(())
    }
}

impl FrameSource for FfmpegTranscoder {
    fn extract_frame(&self, video: &[u8], request: &FrameRequest) -> Result<Vec<u8>, MediaError> {
        let workdir = Self::workdir("mediaflow-frame-")?;
        let input_path = workdir.path().join("input.mp4");
        let frame_path = workdir.path().join("frame.jpg");
        std::fs::write(&input_path, video)?;

        let output = std::process::Command::new("ffmpeg")
            .args([
                "-y",
                "-ss",
                &request.time_offset_secs.to_string(),
                "-i",
            ])
            .arg(&input_path)
            .args([
                "-vframes",
                "1",
                "-s",
                &format!("{}x{}", request.width, request.height),
                "-q:v",
                "2",
                "-loglevel",
                "error",
            ])
            .arg(&frame_path)
            .output()
            .map_err(|e| MediaError::ExternalTool(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            return Err(MediaError::ExternalTool(format!(
                "frame extraction failed at offset {}s",
                request.time_offset_secs
            )));
        }

        Ok(std::fs::read(&frame_path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn paths() -> (PathBuf, PathBuf) {
        (PathBuf::from("/tmp/in.mp4"), PathBuf::from("/tmp/out.mp4"))
    }

    #[test]
    fn test_codec_labels_map_to_encoders() {
        let (input, output) = paths();
        for (label, encoder) in [("h264", "libx264"), ("h265", "libx265"), ("vp9", "libvpx-vp9")] {
            let options = TranscodeOptions {
                codec: label.to_string(),
                ..Default::default()
            };
            let args = FfmpegTranscoder::build_args(&input, &output, &options);
            assert!(args.contains(&encoder.to_string()), "{} missing for {}", encoder, label);
        }
    }

    #[test]
    fn test_aspect_preserving_scale_pads_instead_of_stretching() {
        let (input, output) = paths();
        let options = TranscodeOptions {
            target_width: 1280,
            target_height: 720,
            maintain_aspect: true,
            ..Default::default()
        };
        let args = FfmpegTranscoder::build_args(&input, &output, &options);
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert!(args[vf + 1].contains("force_original_aspect_ratio=decrease"));
        assert!(args[vf + 1].contains("pad=1280:720"));

        let options = TranscodeOptions {
            target_width: 1280,
            target_height: 720,
            maintain_aspect: false,
            ..Default::default()
        };
        let args = FfmpegTranscoder::build_args(&input, &output, &options);
        assert!(args.contains(&"1280x720".to_string()));
    }

    #[test]
    fn test_trim_arguments() {
        let (input, output) = paths();
        let options = TranscodeOptions {
            time_offset_secs: Some(30),
            duration_secs: Some(10),
            ..Default::default()
        };
        let args = FfmpegTranscoder::build_args(&input, &output, &options);
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "30");
        // Seek happens before the input is opened
        assert!(ss < args.iter().position(|a| a == "-i").unwrap());
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "10");
    }

    #[test]
    fn test_overlay_positions() {
        assert_eq!(OverlayPosition::TopLeft.filter_expr(), "overlay=10:10");
        assert_eq!(
            OverlayPosition::BottomRight.filter_expr(),
            "overlay=main_w-overlay_w-10:main_h-overlay_h-10"
        );

        let (input, output) = paths();
        let options = TranscodeOptions {
            target_width: 640,
            target_height: 480,
            overlay: Some((vec![1, 2, 3], OverlayPosition::TopRight)),
            ..Default::default()
        };
        let args = FfmpegTranscoder::build_args(&input, &output, &options);
        assert!(args.contains(&"-filter_complex".to_string()));
        // Overlay suppresses the scale filter
        assert!(!args.contains(&"-vf".to_string()));
    }

    #[test]
    fn test_audio_arguments() {
        let (input, output) = paths();
        let options = TranscodeOptions {
            audio_codec: "mp3".to_string(),
            audio_bitrate_kbps: 192,
            ..Default::default()
        };
        let args = FfmpegTranscoder::build_args(&input, &output, &options);
        assert!(args.contains(&"libmp3lame".to_string()));
        assert!(args.contains(&"192k".to_string()));
    }

    #[test]
    fn test_estimate_size() {
        let info = VideoStreamInfo {
            duration: 60.0,
            bitrate: 4_000_000,
            width: 1920,
            height: 1080,
            codec: "h264".to_string(),
        };
        // 1000 kbps over 60s → 7.5 MB
        assert_eq!(info.estimate_size(1000), 7_500_000);
    }
}
