//! # Size-Constrained Search Module
//!
//! Finds an encoding that meets a byte budget by lowering quality in fixed
//! steps and re-invoking the codec collaborator.
//!
//! The search encodes once at the plan's quality and returns immediately when
//! the budget is unbounded or already met. Otherwise it steps the quality down
//! by 10 (clamped to a floor of 10) and re-encodes until the budget is met or
//! the floor is reached. The step/floor pair bounds the re-encode loop
//! regardless of codec behavior; monotonicity of size in quality is assumed,
//! not verified. The last encoding produced is always reported, whether or not
//! the budget was met.
//!
//! PNG plans carry a compression level (0-9) in the quality slot, so a single
//! step lands at the floor and the search never iterates for PNG.

use crate::codec::Codec;
use crate::encoding::EncodingPlan;
use crate::error::MediaError;
use image::DynamicImage;
use tracing::debug;

/// Quality below which the search stops lowering.
pub const QUALITY_FLOOR: u8 = 10;
/// Fixed quality decrement per re-encode.
pub const QUALITY_STEP: u8 = 10;

/// Result of one size-constrained search.
#[derive(Debug)]
pub struct SearchResult {
    pub data: Vec<u8>,
    /// Quality of the last encoding attempt.
    pub quality_used: u8,
    /// Total encode passes, the initial one included.
    pub iterations: u32,
    /// Whether the final encoding fits the requested budget.
    pub within_budget: bool,
}

/// Iterative quality-lowering search against a byte budget.
pub struct SizeConstraintSearch;

impl SizeConstraintSearch {
    /// Runs the search. `max_bytes == 0` means unbounded (single encode).
    pub fn run(
        codec: &dyn Codec,
        image: &DynamicImage,
        plan: &EncodingPlan,
        max_bytes: u64,
    ) -> Result<SearchResult, MediaError> {
        let mut attempt = *plan;
        let mut data = codec.encode(image, &attempt)?;
        let mut iterations = 1u32;

        if max_bytes == 0 {
            return Ok(SearchResult {
                data,
                quality_used: attempt.quality,
                iterations,
                within_budget: true,
            });
        }

        while data.len() as u64 > max_bytes && attempt.quality > QUALITY_FLOOR {
            attempt.quality = attempt.quality.saturating_sub(QUALITY_STEP).max(QUALITY_FLOOR);
            debug!(
                "Output {} bytes over {} budget, re-encoding at quality {}",
                data.len(),
                max_bytes,
                attempt.quality
            );
            data = codec.encode(image, &attempt)?;
            iterations += 1;
        }

        let within_budget = data.len() as u64 <= max_bytes;
        if !within_budget {
            debug!(
                "Quality floor reached at {}; final output {} bytes exceeds {} budget",
                attempt.quality,
                data.len(),
                max_bytes
            );
        }

        Ok(SearchResult {
            data,
            quality_used: attempt.quality,
            iterations,
            within_budget,
        })
    }
}
