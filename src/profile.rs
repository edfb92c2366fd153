//! # Optimization Profile Module
//!
//! The caller-facing configuration surface of the pipeline.
//!
//! ## Responsibilities:
//! - Defines `OptimizationProfile` with all optimization constraints
//! - Validates parameters (quality range, byte budget)
//! - JSON load/save for profiles kept on disk
//! - `ProfileSelector` derives a profile from a target-use label plus the
//!   analyzer's findings (smart optimization)
//!
//! ## Recognized options:
//! - `target_quality`: logical quality (1-100, default: 85)
//! - `max_width` / `max_height`: dimension caps, 0 = unbounded
//! - `max_file_size_kb`: byte budget for the size-constrained search, 0 = unbounded
//! - `prefer_web_format`: prefer WebP output
//! - `lossless_required`: force lossless (PNG) output
//! - `progressive_required`: request progressive JPEG scans
//! - `preserve_aspect`: keep the original aspect ratio when capping dimensions
//! - `strict_size_budget`: report a missed byte budget as failure instead of
//!   best-effort success (default: false, matching historical behavior)
//!
//! A profile is consumed read-only by one pipeline invocation; only the size
//! search works on a local copy of the quality.

use crate::analyzer::MediaAsset;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optimization constraints for one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationProfile {
    /// Logical quality (1-100)
    pub target_quality: u8,
    /// Maximum output width in pixels (0 = unbounded)
    pub max_width: u32,
    /// Maximum output height in pixels (0 = unbounded)
    pub max_height: u32,
    /// Output byte budget in KB (0 = unbounded)
    pub max_file_size_kb: u64,
    /// Prefer the web format (WebP) for output
    pub prefer_web_format: bool,
    /// Force lossless output
    pub lossless_required: bool,
    /// Request progressive JPEG scans
    pub progressive_required: bool,
    /// Preserve aspect ratio when applying dimension caps
    pub preserve_aspect: bool,
    /// Treat a missed byte budget as failure rather than best-effort success
    pub strict_size_budget: bool,
}

impl Default for OptimizationProfile {
    fn default() -> Self {
        Self {
            target_quality: 85,
            max_width: 0,
            max_height: 0,
            max_file_size_kb: 0,
            prefer_web_format: false,
            lossless_required: false,
            progressive_required: false,
            preserve_aspect: true,
            strict_size_budget: false,
        }
    }
}

impl OptimizationProfile {
    /// Validate profile parameters
    pub fn validate(&self) -> Result<()> {
        if self.target_quality == 0 || self.target_quality > 100 {
            return Err(anyhow::anyhow!("Target quality must be between 1 and 100"));
        }
        Ok(())
    }

    /// Byte budget derived from `max_file_size_kb` (0 = unbounded).
    pub fn max_bytes(&self) -> u64 {
        self.max_file_size_kb * 1024
    }

    /// Load a profile from a JSON file; missing file yields the default.
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let profile: OptimizationProfile = serde_json::from_str(&content)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Save a profile to a JSON file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Intended delivery target for smart optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetUse {
    Web,
    Mobile,
    Print,
    Generic,
}

impl TargetUse {
    /// Parses a target-use label; anything unrecognized is `Generic`.
    pub fn parse(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "web" => TargetUse::Web,
            "mobile" => TargetUse::Mobile,
            "print" => TargetUse::Print,
            _ => TargetUse::Generic,
        }
    }
}

/// Derives an [`OptimizationProfile`] from asset characteristics and a
/// target-use label. Deterministic given identical inputs.
pub struct ProfileSelector;

impl ProfileSelector {
    const SMALL_FILE_BYTES: u64 = 50 * 1024;

    pub fn select(asset: &MediaAsset, target_use: TargetUse) -> OptimizationProfile {
        let mut profile = match target_use {
            TargetUse::Web => OptimizationProfile {
                target_quality: 85,
                max_width: 1920,
                max_height: 1080,
                max_file_size_kb: 500,
                prefer_web_format: true,
                progressive_required: true,
                ..Default::default()
            },
            TargetUse::Mobile => OptimizationProfile {
                target_quality: 75,
                max_width: 1080,
                max_height: 720,
                max_file_size_kb: 200,
                prefer_web_format: true,
                ..Default::default()
            },
            TargetUse::Print => OptimizationProfile {
                target_quality: 95,
                lossless_required: true,
                ..Default::default()
            },
            TargetUse::Generic => OptimizationProfile {
                target_quality: 85,
                prefer_web_format: true,
                progressive_required: true,
                ..Default::default()
            },
        };

        // Alpha-safe encoding takes priority over the base table
        if asset.has_alpha {
            profile.prefer_web_format = true;
            profile.lossless_required = true;
        }

        // Small inputs tolerate higher fidelity without much size cost
        if asset.file_size < Self::SMALL_FILE_BYTES {
            profile.target_quality = (profile.target_quality + 10).min(95);
        }

        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::MediaKind;
    use tempfile::TempDir;

    fn asset(has_alpha: bool, file_size: u64) -> MediaAsset {
        MediaAsset {
            kind: MediaKind::Image,
            format: Some("PNG"),
            width: 1200,
            height: 800,
            has_alpha,
            color_depth: 8,
            aspect_ratio: 1.5,
            file_size,
        }
    }

    #[test]
    fn test_profile_validation() {
        let mut profile = OptimizationProfile::default();
        assert!(profile.validate().is_ok());

        profile.target_quality = 0;
        assert!(profile.validate().is_err());

        profile.target_quality = 101;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_mobile_profile_bounds() {
        let profile = ProfileSelector::select(&asset(false, 500 * 1024), TargetUse::Mobile);
        assert!(profile.max_width <= 1080);
        assert!(profile.max_height <= 720);
        assert!(profile.max_file_size_kb <= 200);
        assert_eq!(profile.target_quality, 75);
        assert!(!profile.progressive_required);
    }

    #[test]
    fn test_alpha_overrides_base_table() {
        let profile = ProfileSelector::select(&asset(true, 500 * 1024), TargetUse::Mobile);
        assert!(profile.lossless_required);
        assert!(profile.prefer_web_format);
    }

    #[test]
    fn test_small_input_raises_quality_capped() {
        let profile = ProfileSelector::select(&asset(false, 10 * 1024), TargetUse::Web);
        assert_eq!(profile.target_quality, 95);

        let profile = ProfileSelector::select(&asset(false, 10 * 1024), TargetUse::Print);
        assert_eq!(profile.target_quality, 95);
    }

    #[test]
    fn test_print_profile_is_lossless_and_unbounded() {
        let profile = ProfileSelector::select(&asset(false, 500 * 1024), TargetUse::Print);
        assert!(profile.lossless_required);
        assert_eq!(profile.max_width, 0);
        assert_eq!(profile.max_height, 0);
        assert_eq!(profile.max_file_size_kb, 0);
    }

    #[test]
    fn test_unknown_target_use_is_generic() {
        assert_eq!(TargetUse::parse("archive"), TargetUse::Generic);
        let profile = ProfileSelector::select(&asset(false, 500 * 1024), TargetUse::Generic);
        assert_eq!(profile.max_width, 0);
        assert!(profile.prefer_web_format);
    }

    #[tokio::test]
    async fn test_profile_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("profile.json");

        let original = OptimizationProfile {
            target_quality: 70,
            max_width: 640,
            max_file_size_kb: 120,
            strict_size_budget: true,
            ..Default::default()
        };

        original.save_to_file(&path).await.unwrap();
        let loaded = OptimizationProfile::from_file(&path).await.unwrap();

        assert_eq!(loaded.target_quality, 70);
        assert_eq!(loaded.max_width, 640);
        assert_eq!(loaded.max_file_size_kb, 120);
        assert!(loaded.strict_size_budget);
    }

    #[tokio::test]
    async fn test_missing_profile_file_yields_default() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = OptimizationProfile::from_file(&temp_dir.path().join("nope.json"))
            .await
            .unwrap();
        assert_eq!(loaded.target_quality, 85);
    }
}
