use async_trait::async_trait;
use metrix_common::MetricRecord;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::{PersistError, Result};
use crate::SnapshotStore;

/// Snapshot kept as one JSON array on the first line of a file.
///
/// Saves go to `<path>.tmp`, are fsynced, then renamed over `<path>`, so a
/// crash mid-save leaves the previous snapshot intact.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Creates the parent directory of `path` if it does not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = parent_dir(&path) {
            std::fs::create_dir_all(parent).map_err(|source| PersistError::File {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> PersistError {
        PersistError::File {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

#[async_trait]
impl SnapshotStore for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn restore(&self) -> Result<Vec<MetricRecord>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No snapshot file, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(&self.path, e)),
        };

        let first_line = content
            .split(|b| *b == b'\n')
            .next()
            .unwrap_or_default();
        if first_line.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let records: Vec<MetricRecord> = serde_json::from_slice(first_line)?;
        tracing::debug!(path = %self.path.display(), count = records.len(), "Read snapshot file");
        Ok(records)
    }

    async fn save(&self, records: &[MetricRecord]) -> Result<()> {
        let mut line = serde_json::to_vec(records)?;
        line.push(b'\n');

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| self.io_error(&tmp, e))?;
        file.write_all(&line).await.map_err(|e| self.io_error(&tmp, e))?;
        file.sync_all().await.map_err(|e| self.io_error(&tmp, e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), count = records.len(), "Wrote snapshot file");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let dir = parent_dir(&self.path).unwrap_or(Path::new("."));
        let meta = tokio::fs::metadata(dir)
            .await
            .map_err(|e| self.io_error(dir, e))?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(self.io_error(dir, std::io::Error::other("not a directory")))
        }
    }
}
