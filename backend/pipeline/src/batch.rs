//! Batch runner: one end-to-end pass over an image directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use imgscribe_core::{BatchError, ImageAnalyzer, OrderedReport, ReportSink};
use imgscribe_logging::{BatchEvent, BatchEventLogger};

use crate::aggregator::{build_report, write_report, WriteSummary};
use crate::dispatcher::Dispatcher;
use crate::rate_limiter::{RateLimitPolicy, RateLimiter};
use crate::sequencer::{sequence, SequenceMode};
use crate::usage::{UsageSnapshot, UsageTally};

/// Everything a batch needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub images_dir: PathBuf,
    pub prompt: String,
    pub sequencing: SequenceMode,
    pub rate_limit: RateLimitPolicy,
    pub call_timeout: Option<Duration>,
}

/// What a finished batch produced.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Images that reached the dispatcher.
    pub total_images: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Files left out during sequencing.
    pub skipped: usize,
    pub usage: UsageSnapshot,
    pub elapsed: Duration,
    pub report: OrderedReport,
    pub write: WriteSummary,
}

impl BatchReport {
    /// Observed throughput over the whole analysis phase.
    pub fn images_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.total_images as f64 / secs } else { 0.0 }
    }
}

pub struct BatchRunner {
    analyzer: Arc<dyn ImageAnalyzer>,
    limiter: RateLimiter,
    options: BatchOptions,
}

impl BatchRunner {
    pub fn new(analyzer: Arc<dyn ImageAnalyzer>, options: BatchOptions) -> Self {
        Self {
            analyzer,
            limiter: RateLimiter::new(options.rate_limit.clone()),
            options,
        }
    }

    /// Handle to the batch's rate limiter; closing it cancels queued work.
    pub fn limiter(&self) -> RateLimiter {
        self.limiter.clone()
    }

    /// Sequence, analyze, aggregate, and write to `sink`.
    ///
    /// Fails only when the image directory itself is unusable.
    pub async fn run(&self, sink: &mut dyn ReportSink) -> Result<BatchReport, BatchError> {
        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();

        let sequenced = sequence(&self.options.images_dir, self.options.sequencing).await?;
        for item in &sequenced.items {
            BatchEventLogger::log_event(
                batch_id,
                BatchEvent::Sequenced {
                    position: item.position,
                    file: item.path.display().to_string(),
                },
            );
        }

        let total_images = sequenced.items.len();
        info!(%batch_id, total_images, "Total images to be analyzed");
        if let Some(rate) = self.options.rate_limit.max_calls_per_sec() {
            info!(%batch_id, "Processing at up to {rate:.0} images per second");
        }

        let usage = Arc::new(UsageTally::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.analyzer),
            self.limiter.clone(),
            self.options.prompt.as_str(),
        )
        .with_call_timeout(self.options.call_timeout)
        .with_usage(Arc::clone(&usage))
        .with_batch_id(batch_id);

        let clock = Instant::now();
        let results = dispatcher.dispatch(sequenced.items).await;
        let elapsed = clock.elapsed();

        let report = build_report(&results);
        let write = write_report(&report, sink).await;
        BatchEventLogger::log_event(
            batch_id,
            BatchEvent::Written {
                lines: write.written,
                failures: write.failures,
                target: sink.target(),
            },
        );

        let batch = BatchReport {
            batch_id,
            started_at,
            total_images,
            succeeded: results.succeeded(),
            failed: results.failed(),
            skipped: sequenced.skipped.len(),
            usage: usage.snapshot(),
            elapsed,
            report,
            write,
        };

        BatchEventLogger::log_event(
            batch_id,
            BatchEvent::Finished {
                succeeded: batch.succeeded,
                failed: batch.failed,
                elapsed_ms: elapsed.as_millis(),
            },
        );
        info!(
            %batch_id,
            "Actual processing time: {:.2} seconds, actual rate: {:.2} images per second",
            elapsed.as_secs_f64(),
            batch.images_per_sec()
        );
        Ok(batch)
    }
}
