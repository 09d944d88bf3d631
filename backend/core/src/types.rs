use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Image extensions accepted by the sequencer (compared case-insensitively).
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpeg", "jpg"];

/// Whether a path carries one of the supported image extensions.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            SUPPORTED_IMAGE_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// How positions are attached to images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SequenceMode {
    /// Positions live only in memory; files keep their names.
    #[default]
    InMemory,
    /// Files are renamed to `<position>.<ext>` on disk.
    Rename,
}

impl FromStr for SequenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-memory" | "memory" => Ok(Self::InMemory),
            "rename" => Ok(Self::Rename),
            _ => Err(format!("unknown sequencing mode '{}'. Use 'in-memory' or 'rename'", s.trim())),
        }
    }
}

/// An image as found in the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageItem {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// An image with its 1-based position in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedItem {
    pub position: u32,
    pub path: PathBuf,
}

/// Token accounting reported by the analyzer for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Successful analyzer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl Extraction {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Result of analyzing one sequenced image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Success { text: String },
    Failure { reason: AnalysisError },
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success { .. })
    }

    /// The report line for this outcome: the text, or the failure marker.
    pub fn line(&self) -> &str {
        match self {
            AnalysisOutcome::Success { text } => text,
            AnalysisOutcome::Failure { reason } => reason.kind().failure_marker(),
        }
    }
}

/// Outcomes keyed by position. Iteration is always in ascending position order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultMap {
    outcomes: BTreeMap<u32, AnalysisOutcome>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for a position. Returns the previous outcome if the
    /// position was already taken, which indicates a sequencing bug.
    pub fn record(&mut self, position: u32, outcome: AnalysisOutcome) -> Option<AnalysisOutcome> {
        self.outcomes.insert(position, outcome)
    }

    pub fn get(&self, position: u32) -> Option<&AnalysisOutcome> {
        self.outcomes.get(&position)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &AnalysisOutcome)> {
        self.outcomes.iter().map(|(p, o)| (*p, o))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

impl FromIterator<(u32, AnalysisOutcome)> for ResultMap {
    fn from_iter<I: IntoIterator<Item = (u32, AnalysisOutcome)>>(iter: I) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

/// The ordered lines handed to the output sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedReport {
    lines: Vec<String>,
}

impl OrderedReport {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Render as the artifact content: every line newline-terminated.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(is_supported_image(Path::new("scan.PNG")));
        assert!(is_supported_image(Path::new("dir/photo.Jpeg")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("png")));
    }

    #[test]
    fn parses_sequence_mode() {
        assert_eq!("rename".parse::<SequenceMode>().unwrap(), SequenceMode::Rename);
        assert_eq!(" In-Memory ".parse::<SequenceMode>().unwrap(), SequenceMode::InMemory);
        assert_eq!("memory".parse::<SequenceMode>().unwrap(), SequenceMode::InMemory);
        let err = "Shuffle".parse::<SequenceMode>().unwrap_err();
        assert!(err.contains("'Shuffle'"), "{err}");
    }

    #[test]
    fn result_map_iterates_by_position() {
        let map: ResultMap = [3, 1, 2]
            .into_iter()
            .map(|p| (p, AnalysisOutcome::Success { text: format!("t{p}") }))
            .collect();
        let order: Vec<u32> = map.iter().map(|(p, _)| p).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn failure_line_uses_marker() {
        let outcome = AnalysisOutcome::Failure {
            reason: AnalysisError::Remote("503".into()),
        };
        assert_eq!(outcome.line(), "Failed to analyze image");
    }
}
