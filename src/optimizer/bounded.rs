//! # Bounded Job Module
//!
//! Deadline-bounded execution for long-running work, video transforms in
//! particular. A job that misses its deadline is reported as timed out and
//! its external process is told to stop; it never blocks the caller forever.

use crate::optimizer::pipeline::MediaPipeline;
use crate::transcoder::TranscodeOptions;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Lifecycle of a bounded job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

/// Result of running a future against a deadline.
#[derive(Debug)]
pub enum JobOutcome<T> {
    Completed(T),
    TimedOut,
}

/// Record of one video transform job.
#[derive(Debug)]
pub struct VideoJob {
    pub id: u64,
    pub state: JobState,
    pub deadline: Duration,
    pub output: Option<Vec<u8>>,
    pub error: Option<String>,
}

/// Runs futures under a deadline and assigns monotonically increasing job
/// ids.
#[derive(Debug, Default)]
pub struct BoundedJobRunner {
    next_id: AtomicU64,
}

impl BoundedJobRunner {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Races a future against the deadline.
    pub async fn run_with_deadline<T, F>(&self, deadline: Duration, fut: F) -> JobOutcome<T>
    where
        F: Future<Output = T>,
    {
        match tokio::time::timeout(deadline, fut).await {
            Ok(value) => JobOutcome::Completed(value),
            Err(_) => JobOutcome::TimedOut,
        }
    }

    /// Runs one video transform under a deadline.
    ///
    /// On timeout the transcoder is signalled over a broadcast channel so the
    /// external process is killed rather than orphaned.
    pub async fn run_video_job(
        &self,
        pipeline: Arc<MediaPipeline>,
        input: Vec<u8>,
        options: TranscodeOptions,
        deadline: Duration,
    ) -> VideoJob {
        let id = self.next_id();
        let (stop_tx, stop_rx) = broadcast::channel(1);
        info!("Video job {} started, deadline {:?}", id, deadline);

        let work = tokio::spawn(async move {
            pipeline.transform_video(&input, &options, Some(stop_rx)).await
        });

        match tokio::time::timeout(deadline, work).await {
            Ok(Ok(Ok(output))) => VideoJob {
                id,
                state: JobState::Completed,
                deadline,
                output: Some(output),
                error: None,
            },
            Ok(Ok(Err(e))) => VideoJob {
                id,
                state: JobState::Failed,
                deadline,
                output: None,
                error: Some(e.to_string()),
            },
            Ok(Err(join_err)) => VideoJob {
                id,
                state: JobState::Failed,
                deadline,
                output: None,
                error: Some(format!("task failed: {}", join_err)),
            },
            Err(_) => {
                warn!("Video job {} missed its {:?} deadline", id, deadline);
                let _ = stop_tx.send(());
                VideoJob {
                    id,
                    state: JobState::TimedOut,
                    deadline,
                    output: None,
                    error: Some(format!("deadline of {:?} exceeded", deadline)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_fast_future_completes() {
        let runner = BoundedJobRunner::new();
        let outcome = runner
            .run_with_deadline(Duration::from_millis(200), async { 7 })
            .await;
        assert!(matches!(outcome, JobOutcome::Completed(7)));
    }

    #[tokio::test]
    async fn test_slow_future_times_out() {
        let runner = BoundedJobRunner::new();
        let outcome = runner
            .run_with_deadline(Duration::from_millis(10), async {
                sleep(Duration::from_secs(5)).await;
                7
            })
            .await;
        assert!(matches!(outcome, JobOutcome::TimedOut));
    }

    #[tokio::test]
    async fn test_job_ids_are_unique_and_increasing() {
        let runner = BoundedJobRunner::new();
        let a = runner.next_id();
        let b = runner.next_id();
        let c = runner.next_id();
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn test_timeout_signals_stop_channel() {
        // Stands in for the transcoder side of a video job: the worker holds
        // the receiver and must observe the stop signal sent on timeout.
        let (stop_tx, mut stop_rx) = broadcast::channel::<()>(1);
        let worker = tokio::spawn(async move {
            tokio::select! {
                _ = sleep(Duration::from_secs(30)) => false,
                _ = stop_rx.recv() => true,
            }
        });

        let slow = async { sleep(Duration::from_secs(30)).await };
        if tokio::time::timeout(Duration::from_millis(10), slow).await.is_err() {
            let _ = stop_tx.send(());
        }

        assert!(worker.await.unwrap());
    }
}
