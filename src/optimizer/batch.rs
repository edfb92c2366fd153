//! # Batch Orchestration Module
//!
//! Fans a list of assets out over a bounded worker pool and returns outcomes
//! in submission order. One bad asset never takes the batch down; it simply
//! produces a failed outcome at its index.

use crate::analyzer::MediaKind;
use crate::optimizer::pipeline::{MediaPipeline, OptimizationOutcome};
use crate::profile::OptimizationProfile;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

/// Runs many optimizations concurrently with a fixed concurrency limit.
pub struct BatchOrchestrator {
    pipeline: Arc<MediaPipeline>,
    workers: usize,
}

impl BatchOrchestrator {
    pub fn new(pipeline: Arc<MediaPipeline>, workers: usize) -> Self {
        Self {
            pipeline,
            workers: workers.max(1),
        }
    }

    /// Optimizes every item against the shared profile.
    ///
    /// Items and kinds are paired by index; entries beyond the shorter list
    /// are ignored. At most `workers` items are in flight at once; results
    /// come back in the order items were submitted regardless of completion
    /// order.
    pub async fn run(
        &self,
        items: Vec<Vec<u8>>,
        kinds: Vec<MediaKind>,
        profile: &OptimizationProfile,
    ) -> Vec<OptimizationOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(items.len().min(kinds.len()));

        for (index, (item, kind)) in items.into_iter().zip(kinds).enumerate() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break, // semaphore never closed; unreachable
            };
            let pipeline = self.pipeline.clone();
            let profile = profile.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                debug!("Batch item {} started as {}", index, kind);
                pipeline.optimize(&item, kind, &profile).await
            }));
        }

        // join_all preserves submission order regardless of completion order
        join_all(handles)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, joined)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Batch item {} panicked: {}", index, e);
                    OptimizationOutcome::failed(0, 0, format!("task failed: {}", e))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, StandardCodec};
    use crate::encoding::{EncodingPlan, OutputFormat};
    use image::{DynamicImage, RgbImage};

    fn solid_jpeg(shade: u8) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, image::Rgb([shade; 3])));
        let plan = EncodingPlan {
            format: OutputFormat::Jpeg,
            quality: 90,
            progressive: false,
        };
        StandardCodec::new().encode(&image, &plan).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_outcomes_keep_submission_order() {
        let orchestrator = BatchOrchestrator::new(Arc::new(MediaPipeline::new()), 4);
        // Item 0 is much larger than the rest, so it finishes last under
        // concurrency, yet must still come back first.
        let mut items = vec![{
            let image =
                DynamicImage::ImageRgb8(RgbImage::from_pixel(1600, 1200, image::Rgb([5; 3])));
            let plan = EncodingPlan {
                format: OutputFormat::Jpeg,
                quality: 95,
                progressive: false,
            };
            StandardCodec::new().encode(&image, &plan).unwrap()
        }];
        for shade in 1..8u8 {
            items.push(solid_jpeg(shade * 30));
        }
        let sizes: Vec<u64> = items.iter().map(|i| i.len() as u64).collect();
        let kinds = vec![MediaKind::Image; items.len()];

        let outcomes = orchestrator
            .run(items, kinds, &OptimizationProfile::default())
            .await;

        assert_eq!(outcomes.len(), 8);
        for (outcome, size) in outcomes.iter().zip(sizes) {
            assert!(outcome.success);
            assert_eq!(outcome.original_size, size);
        }
    }

    #[tokio::test]
    async fn test_one_bad_item_does_not_sink_the_batch() {
        let orchestrator = BatchOrchestrator::new(Arc::new(MediaPipeline::new()), 2);
        let items = vec![solid_jpeg(40), vec![0u8; 32], solid_jpeg(80)];
        let kinds = vec![MediaKind::Image; 3];

        let outcomes = orchestrator
            .run(items, kinds, &OptimizationProfile::default())
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(outcomes[1]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("Decode error"));
        assert!(outcomes[2].success);
    }

    #[tokio::test]
    async fn test_extra_entries_beyond_shorter_list_ignored() {
        let orchestrator = BatchOrchestrator::new(Arc::new(MediaPipeline::new()), 2);

        // More kinds than items
        let outcomes = orchestrator
            .run(
                vec![solid_jpeg(40)],
                vec![MediaKind::Image, MediaKind::Video, MediaKind::Image],
                &OptimizationProfile::default(),
            )
            .await;
        assert_eq!(outcomes.len(), 1);

        // More items than kinds
        let outcomes = orchestrator
            .run(
                vec![solid_jpeg(40), solid_jpeg(80), solid_jpeg(120)],
                vec![MediaKind::Image],
                &OptimizationProfile::default(),
            )
            .await;
        assert_eq!(outcomes.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let orchestrator = BatchOrchestrator::new(Arc::new(MediaPipeline::new()), 4);
        let outcomes = orchestrator
            .run(Vec::new(), Vec::new(), &OptimizationProfile::default())
            .await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_worker_count_floor() {
        // A zero worker request still processes work.
        let orchestrator = BatchOrchestrator::new(Arc::new(MediaPipeline::new()), 0);
        let outcomes = orchestrator
            .run(
                vec![solid_jpeg(10)],
                vec![MediaKind::Image],
                &OptimizationProfile::default(),
            )
            .await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].success);
    }
}
