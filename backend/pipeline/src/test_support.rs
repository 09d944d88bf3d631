//! Test doubles for the analyzer and sink collaborators.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use imgscribe_core::{
    AnalysisError, Extraction, ImageAnalyzer, ReportSink, TokenUsage, WriteError,
};

/// Answers `text-<stem>` for every image, where `<stem>` is the file stem.
///
/// Latency and failures are configured per stem. Tracks the high-water mark
/// of concurrent calls.
#[derive(Default)]
pub struct StubAnalyzer {
    latency: HashMap<String, Duration>,
    failing: HashSet<String>,
    tokens_per_call: Option<u64>,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
    calls: AtomicUsize,
}

impl StubAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, stem: &str, latency: Duration) -> Self {
        self.latency.insert(stem.to_string(), latency);
        self
    }

    pub fn failing_on(mut self, stem: &str) -> Self {
        self.failing.insert(stem.to_string());
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_per_call = Some(tokens);
        self
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageAnalyzer for StubAnalyzer {
    fn name(&self) -> &str {
        "stub"
    }

    async fn analyze(&self, image_path: &Path, _prompt: &str) -> Result<Extraction, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);

        let stem = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let delay = self
            .latency
            .get(&stem)
            .copied()
            .unwrap_or(Duration::from_millis(5));
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&stem) {
            return Err(AnalysisError::Remote(format!("stub failure for {stem}")));
        }
        let mut extraction = Extraction::new(format!("text-{stem}"));
        if let Some(tokens) = self.tokens_per_call {
            extraction = extraction.with_usage(TokenUsage {
                prompt_tokens: tokens,
                completion_tokens: 0,
                total_tokens: tokens,
            });
        }
        Ok(extraction)
    }
}

/// Sink that rejects chosen line indexes (0-based) and records the rest.
#[derive(Default)]
pub struct FlakySink {
    pub fail_at: HashSet<usize>,
    pub attempts: usize,
    pub lines: Vec<String>,
}

#[async_trait]
impl ReportSink for FlakySink {
    fn target(&self) -> String {
        "flaky".to_string()
    }

    async fn write_line(&mut self, line: &str) -> Result<(), WriteError> {
        let index = self.attempts;
        self.attempts += 1;
        if self.fail_at.contains(&index) {
            return Err(WriteError::PermissionDenied { target: self.target() });
        }
        self.lines.push(line.to_string());
        Ok(())
    }
}

/// Sequenced items named `<position>.png` under `/stub`.
pub fn numbered_items(n: u32) -> Vec<imgscribe_core::SequencedItem> {
    (1..=n)
        .map(|position| imgscribe_core::SequencedItem {
            position,
            path: Path::new("/stub").join(format!("{position}.png")),
        })
        .collect()
}
