//! Dispatcher: one analysis task per sequenced image, all spawned up front.
//!
//! Throttling happens inside each task through the [`RateLimiter`]. A task's
//! failure is recorded as a `Failure` outcome for its position and never
//! affects its siblings. [`Dispatcher::dispatch`] returns only once every
//! task has finished.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use imgscribe_core::{AnalysisError, AnalysisOutcome, ImageAnalyzer, ResultMap, SequencedItem};
use imgscribe_logging::{BatchEvent, BatchEventLogger};

use crate::rate_limiter::RateLimiter;
use crate::usage::UsageTally;

pub struct Dispatcher {
    analyzer: Arc<dyn ImageAnalyzer>,
    limiter: RateLimiter,
    prompt: Arc<str>,
    call_timeout: Option<Duration>,
    usage: Arc<UsageTally>,
    batch_id: Uuid,
}

impl Dispatcher {
    pub fn new(
        analyzer: Arc<dyn ImageAnalyzer>,
        limiter: RateLimiter,
        prompt: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            analyzer,
            limiter,
            prompt: prompt.into(),
            call_timeout: None,
            usage: Arc::new(UsageTally::new()),
            batch_id: Uuid::new_v4(),
        }
    }

    /// Fail any single call that runs longer than `timeout`.
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_usage(mut self, usage: Arc<UsageTally>) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_batch_id(mut self, batch_id: Uuid) -> Self {
        self.batch_id = batch_id;
        self
    }

    pub fn usage(&self) -> &Arc<UsageTally> {
        &self.usage
    }

    /// Analyze every item concurrently and collect the outcomes by position.
    pub async fn dispatch(&self, items: Vec<SequencedItem>) -> ResultMap {
        info!(
            batch_id = %self.batch_id,
            analyzer = self.analyzer.name(),
            tasks = items.len(),
            max_concurrent = self.limiter.policy().max_concurrent,
            "Dispatching analysis tasks"
        );

        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let task = AnalysisTask {
                    analyzer: Arc::clone(&self.analyzer),
                    limiter: self.limiter.clone(),
                    prompt: Arc::clone(&self.prompt),
                    call_timeout: self.call_timeout,
                    usage: Arc::clone(&self.usage),
                    batch_id: self.batch_id,
                };
                let position = item.position;
                (position, tokio::spawn(task.run(item)))
            })
            .collect();

        let joined = join_all(
            handles
                .into_iter()
                .map(|(position, handle)| async move { (position, handle.await) }),
        )
        .await;

        let mut results = ResultMap::new();
        for (position, joined) in joined {
            let outcome = joined.unwrap_or_else(|e| {
                let reason = AnalysisError::TaskPanicked(e.to_string());
                log_failure(self.batch_id, position, &reason);
                AnalysisOutcome::Failure { reason }
            });
            if results.record(position, outcome).is_some() {
                warn!(position, "Duplicate position in batch; keeping the later outcome");
            }
        }

        debug!(
            batch_id = %self.batch_id,
            succeeded = results.succeeded(),
            failed = results.failed(),
            "All analysis tasks finished"
        );
        results
    }
}

struct AnalysisTask {
    analyzer: Arc<dyn ImageAnalyzer>,
    limiter: RateLimiter,
    prompt: Arc<str>,
    call_timeout: Option<Duration>,
    usage: Arc<UsageTally>,
    batch_id: Uuid,
}

impl AnalysisTask {
    async fn run(self, item: SequencedItem) -> AnalysisOutcome {
        let position = item.position;
        match self.analyze(item.path).await {
            Ok((text, tokens)) => {
                BatchEventLogger::log_event(
                    self.batch_id,
                    BatchEvent::Analyzed { position, chars: text.chars().count(), tokens },
                );
                AnalysisOutcome::Success { text }
            }
            Err(reason) => {
                log_failure(self.batch_id, position, &reason);
                AnalysisOutcome::Failure { reason }
            }
        }
    }

    async fn analyze(&self, path: PathBuf) -> Result<(String, Option<u64>), AnalysisError> {
        let _permit = self.limiter.acquire().await?;

        let call = self.analyzer.analyze(&path, &self.prompt);
        let result = match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(AnalysisError::Timeout(limit))),
            None => call.await,
        };

        match result {
            Ok(extraction) => {
                self.usage.record(extraction.usage.as_ref());
                Ok((extraction.text, extraction.usage.map(|u| u.total_tokens)))
            }
            Err(e) => {
                self.usage.record(None);
                Err(e)
            }
        }
    }
}

fn log_failure(batch_id: Uuid, position: u32, reason: &AnalysisError) {
    BatchEventLogger::log_event(
        batch_id,
        BatchEvent::Failed { position, reason: reason.to_string() },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::RateLimitPolicy;
    use crate::test_support::{numbered_items, StubAnalyzer};

    fn limiter(max_concurrent: usize) -> RateLimiter {
        RateLimiter::new(RateLimitPolicy { max_concurrent, min_interval_ms: 0 })
    }

    #[tokio::test]
    async fn every_position_gets_an_outcome_in_order() {
        // Highest position answers fastest.
        let mut stub = StubAnalyzer::new();
        for p in 1..=8u64 {
            stub = stub.with_latency(&p.to_string(), Duration::from_millis(90 - p * 10));
        }
        let dispatcher = Dispatcher::new(Arc::new(stub), limiter(8), "read");

        let results = dispatcher.dispatch(numbered_items(8)).await;
        assert_eq!(results.len(), 8);
        let texts: Vec<&str> = results.iter().map(|(_, o)| o.line()).collect();
        let expected: Vec<String> = (1..=8).map(|p| format!("text-{p}")).collect();
        assert_eq!(texts, expected);
    }

    #[tokio::test]
    async fn in_flight_calls_never_exceed_limit() {
        let stub = Arc::new(StubAnalyzer::new().with_latency("3", Duration::from_millis(30)));
        let dispatcher = Dispatcher::new(stub.clone(), limiter(3), "read");

        let results = dispatcher.dispatch(numbered_items(20)).await;
        assert_eq!(results.len(), 20);
        assert_eq!(stub.calls(), 20);
        assert!(stub.high_water() <= 3, "high water {}", stub.high_water());
        assert!(stub.high_water() >= 1);
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_siblings() {
        let stub = StubAnalyzer::new().failing_on("4");
        let dispatcher = Dispatcher::new(Arc::new(stub), limiter(4), "read");

        let results = dispatcher.dispatch(numbered_items(6)).await;
        assert_eq!(results.len(), 6);
        assert_eq!(results.failed(), 1);
        assert!(matches!(
            results.get(4),
            Some(AnalysisOutcome::Failure { reason: AnalysisError::Remote(_) })
        ));
        assert_eq!(results.get(5).unwrap().line(), "text-5");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let stub = StubAnalyzer::new().with_latency("2", Duration::from_secs(600));
        let dispatcher = Dispatcher::new(Arc::new(stub), limiter(2), "read")
            .with_call_timeout(Some(Duration::from_secs(5)));

        let results = dispatcher.dispatch(numbered_items(3)).await;
        assert!(matches!(
            results.get(2),
            Some(AnalysisOutcome::Failure { reason: AnalysisError::Timeout(_) })
        ));
        assert_eq!(results.succeeded(), 2);
    }

    #[tokio::test]
    async fn closed_limiter_cancels_queued_tasks() {
        let mut stub = StubAnalyzer::new();
        for p in 1..=5 {
            stub = stub.with_latency(&p.to_string(), Duration::from_millis(100));
        }
        let limiter = limiter(1);
        let dispatcher = Dispatcher::new(Arc::new(stub), limiter.clone(), "read");

        let closer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            limiter.close();
        });
        let results = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.dispatch(numbered_items(5)),
        )
        .await
        .expect("dispatch must not deadlock after close");
        closer.await.unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(results.succeeded(), 1, "only the in-flight call completes");
        let cancelled = results
            .iter()
            .filter(|(_, o)| matches!(o, AnalysisOutcome::Failure { reason: AnalysisError::Cancelled }))
            .count();
        assert_eq!(cancelled, 4);
    }

    #[tokio::test]
    async fn usage_is_accumulated() {
        let stub = StubAnalyzer::new().with_tokens(7).failing_on("2");
        let dispatcher = Dispatcher::new(Arc::new(stub), limiter(4), "read");
        dispatcher.dispatch(numbered_items(4)).await;

        let usage = dispatcher.usage().snapshot();
        assert_eq!(usage.calls, 4);
        assert_eq!(usage.total_tokens, 21);
    }
}
