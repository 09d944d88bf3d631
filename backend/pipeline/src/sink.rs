//! Report sinks.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use imgscribe_core::{ReportSink, WriteError};

/// Appends each line to a text file, opening and syncing the file per line
/// so one failed write never poisons the next.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReportSink for FileSink {
    fn target(&self) -> String {
        self.path.display().to_string()
    }

    async fn write_line(&mut self, line: &str) -> Result<(), WriteError> {
        let io_err = |e: std::io::Error| WriteError::from_io(self.target(), e);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).await.map_err(io_err)?;
        file.write_all(b"\n").await.map_err(io_err)?;
        file.sync_data().await.map_err(io_err)?;
        Ok(())
    }
}

/// Collects lines in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    fn target(&self) -> String {
        "memory".to_string()
    }

    async fn write_line(&mut self, line: &str) -> Result<(), WriteError> {
        self.lines.push(line.to_string());
        Ok(())
    }
}
