//! Structured logging for imgscribe.
//!
//! Console + rolling NDJSON file output, secret redaction, and per-item batch events.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{BatchEvent, BatchEventEntry, BatchEventLogger};
pub use logger::{init_logger, LoggerOptions};
pub use redact::redact_sensitive_data;
