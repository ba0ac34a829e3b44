use crate::adapters::spreadsheet::parse_snapshot;
use crate::core::{Snapshot, SnapshotSource};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Reads a previously downloaded export from disk.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn fetch(&self) -> Result<Snapshot> {
        tracing::debug!("Reading snapshot from {}", self.path.display());
        let bytes = tokio::fs::read(&self.path).await?;
        parse_snapshot(&bytes)
    }
}
