//! Batch Event Logger
//!
//! Structured per-item events (sequenced, analyzed, failed, written) emitted
//! through `tracing` on the `batch_events` target, so the NDJSON file layer
//! captures a complete trace of every run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    Sequenced {
        position: u32,
        file: String,
    },
    Analyzed {
        position: u32,
        chars: usize,
        tokens: Option<u64>,
    },
    Failed {
        position: u32,
        reason: String,
    },
    Written {
        lines: usize,
        failures: usize,
        target: String,
    },
    Finished {
        succeeded: usize,
        failed: usize,
        elapsed_ms: u128,
    },
}

#[derive(Debug, Serialize)]
pub struct BatchEventEntry {
    pub batch_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: BatchEvent,
}

pub struct BatchEventLogger;

impl BatchEventLogger {
    /// Redact free text in the event and emit it.
    pub fn log_event(batch_id: Uuid, mut event: BatchEvent) -> BatchEventEntry {
        if let BatchEvent::Failed { reason, .. } = &mut event {
            *reason = redact_sensitive_data(reason);
        }

        let entry = BatchEventEntry {
            batch_id,
            timestamp: Utc::now(),
            event,
        };

        match &entry.event {
            BatchEvent::Failed { .. } => {
                warn!(target: "batch_events", event = ?entry, "Batch item failed")
            }
            _ => info!(target: "batch_events", event = ?entry, "Batch trace event"),
        }
        entry
    }
}
