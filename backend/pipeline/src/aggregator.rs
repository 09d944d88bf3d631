//! Aggregator: turns the result map into ordered report lines and writes them.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use imgscribe_core::{OrderedReport, ReportSink, ResultMap};

/// How many report lines reached the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSummary {
    pub written: usize,
    pub failures: usize,
}

/// One line per recorded position, in ascending position order.
///
/// Positions without an entry are simply absent; nothing is padded.
pub fn build_report(results: &ResultMap) -> OrderedReport {
    OrderedReport::from_lines(results.iter().map(|(_, outcome)| outcome.line().to_string()).collect())
}

/// Write the report line by line. A failed line is logged and skipped.
pub async fn write_report(report: &OrderedReport, sink: &mut dyn ReportSink) -> WriteSummary {
    let mut summary = WriteSummary::default();
    for (index, line) in report.lines().iter().enumerate() {
        match sink.write_line(line).await {
            Ok(()) => {
                summary.written += 1;
                debug!(line = index + 1, target = %sink.target(), "Report line written");
            }
            Err(e) => {
                summary.failures += 1;
                error!(line = index + 1, error = %e, "Failed to write report line");
            }
        }
    }
    summary
}
