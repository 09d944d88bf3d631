//! Usage tally: call and token counters shared by every dispatch task.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use imgscribe_core::TokenUsage;

/// Monotonic counters updated once per completed task.
#[derive(Debug, Default)]
pub struct UsageTally {
    calls: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_tokens: AtomicU64,
}

/// Point-in-time copy of a [`UsageTally`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed call and whatever tokens it reported.
    pub fn record(&self, usage: Option<&TokenUsage>) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(u) = usage {
            self.prompt_tokens.fetch_add(u.prompt_tokens, Ordering::Relaxed);
            self.completion_tokens.fetch_add(u.completion_tokens, Ordering::Relaxed);
            self.total_tokens.fetch_add(u.total_tokens, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
        }
    }
}
