use std::path::Path;

use async_trait::async_trait;

use crate::error::{AnalysisError, WriteError};
use crate::types::Extraction;

/// The remote image-to-text collaborator.
///
/// Implementations encode the image themselves, must be safe to call from
/// many tasks at once, and report every ordinary failure as an
/// [`AnalysisError`] rather than panicking.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Human-readable name of this analyzer (e.g., "openai:gpt-4o").
    fn name(&self) -> &str;

    /// Extract text from the image at `image_path` following `prompt`.
    async fn analyze(&self, image_path: &Path, prompt: &str) -> Result<Extraction, AnalysisError>;
}

/// Destination for report lines.
#[async_trait]
pub trait ReportSink: Send {
    /// Where the lines end up, for log messages.
    fn target(&self) -> String;

    /// Append one line. Each call succeeds or fails independently.
    async fn write_line(&mut self, line: &str) -> Result<(), WriteError>;
}
