//! The imgscribe batch pipeline.
//!
//! Sequencer → Dispatcher (through the RateLimiter) → Aggregator → sink.

pub mod aggregator;
pub mod batch;
pub mod dispatcher;
pub mod rate_limiter;
pub mod sequencer;
pub mod sink;
pub mod usage;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregator::{build_report, write_report, WriteSummary};
pub use batch::{BatchOptions, BatchReport, BatchRunner};
pub use dispatcher::Dispatcher;
pub use rate_limiter::{RateLimitPolicy, RateLimiter, RatePermit};
pub use sequencer::{assign_positions, list_images, sequence, Listing, SequenceMode, SequencingOutcome};
pub use sink::{FileSink, MemorySink};
pub use usage::{UsageSnapshot, UsageTally};
