//! # Error Types Module
//!
//! Typed errors for the media pipeline.
//!
//! ## Categories:
//! - `Io`: filesystem and temp-file errors
//! - `Image`: errors bubbled up from the image codec backend
//! - `Decode`: input bytes the codec rejects (malformed/unsupported)
//! - `Encode`: output parameters the codec rejects
//! - `UnsupportedMediaType`: no pipeline path exists for the requested type
//! - `ExternalTool`: the external transcoder reported a failed status
//! - `Timeout`: a bounded job's deadline elapsed
//! - `MissingDependency`: external tool missing (ffmpeg, ffprobe)
//! - `Validation`: profile/input validation errors
//!
//! Collaborator errors never escape the public operations as raised faults;
//! the pipeline boundary converts them into outcome records with `success =
//! false` and a descriptive error string.

/// Custom error types for media adaptation
#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("External tool failure: {0}")]
    ExternalTool(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
