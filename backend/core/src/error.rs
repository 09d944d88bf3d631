use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Batch-level errors. Only directory preconditions abort a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("failed to list directory {}: {source}", path.display())]
    ListingFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Coarse classification of a failed analysis, used to pick the failure marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Encode,
    Remote,
    MalformedResponse,
    Timeout,
    Cancelled,
    TaskPanicked,
}

impl ErrorKind {
    /// The line written to the report in place of extracted text.
    pub fn failure_marker(self) -> &'static str {
        match self {
            ErrorKind::Encode => "Failed to encode image",
            _ => "Failed to analyze image",
        }
    }
}

/// Why a single image could not be turned into text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("remote analysis call failed: {0}")]
    Remote(String),

    #[error("malformed analysis response: {0}")]
    MalformedResponse(String),

    #[error("analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled while waiting for a rate-limit slot")]
    Cancelled,

    #[error("analysis task panicked: {0}")]
    TaskPanicked(String),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Encode(_) => ErrorKind::Encode,
            AnalysisError::Remote(_) => ErrorKind::Remote,
            AnalysisError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            AnalysisError::Timeout(_) => ErrorKind::Timeout,
            AnalysisError::Cancelled => ErrorKind::Cancelled,
            AnalysisError::TaskPanicked(_) => ErrorKind::TaskPanicked,
        }
    }
}

/// A single file could not be sequenced; the file is left out of the batch.
#[derive(Debug, Error)]
pub enum SequencingError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("permission denied renaming {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("failed to rename {}: {source}", path.display())]
    Other {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SequencingError {
    pub fn from_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => SequencingError::NotFound { path },
            io::ErrorKind::PermissionDenied => SequencingError::PermissionDenied { path },
            _ => SequencingError::Other { path, source: err },
        }
    }
}

/// A single report line could not be written to the sink.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("output not found: {target}")]
    NotFound { target: String },

    #[error("permission denied writing {target}; the file may be in use")]
    PermissionDenied { target: String },

    #[error("failed to write {target}: {source}")]
    Other {
        target: String,
        #[source]
        source: io::Error,
    },
}

impl WriteError {
    pub fn from_io(target: impl Into<String>, err: io::Error) -> Self {
        let target = target.into();
        match err.kind() {
            io::ErrorKind::NotFound => WriteError::NotFound { target },
            io::ErrorKind::PermissionDenied => WriteError::PermissionDenied { target },
            _ => WriteError::Other { target, source: err },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_failures_get_their_own_marker() {
        let err = AnalysisError::Encode("unreadable".into());
        assert_eq!(err.kind().failure_marker(), "Failed to encode image");
        assert_eq!(
            AnalysisError::Cancelled.kind().failure_marker(),
            "Failed to analyze image"
        );
    }

    #[test]
    fn io_errors_are_classified() {
        let err = SequencingError::from_io(
            "a.png",
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(matches!(err, SequencingError::PermissionDenied { .. }));

        let err = WriteError::from_io("out.txt", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(matches!(err, WriteError::NotFound { .. }));
    }
}
