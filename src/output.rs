//! Batch Output Module
//!
//! Writes batches as text files, one record per line. Files are staged in a
//! temporary directory inside the destination and only moved into place by
//! [`BatchWriter::commit`]. Dropping a writer that was never committed removes
//! everything it staged, so a failed run leaves no partial batch set behind.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info};

/// Staged writer for `batch-NNNN.txt` files
pub struct BatchWriter {
    /// Final destination directory
    dir: PathBuf,
    /// Removed on drop together with any file still inside it
    staging: TempDir,
    /// File names staged so far, in batch order
    staged: Vec<String>,
}

impl BatchWriter {
    /// Create the destination directory (if needed) and a staging area in it
    pub async fn create(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let staging = tempfile::Builder::new()
            .prefix(".record-batcher-")
            .tempdir_in(&dir)
            .with_context(|| format!("failed to create staging directory in {}", dir.display()))?;

        Ok(Self {
            dir,
            staging,
            staged: Vec::new(),
        })
    }

    /// Stage the next batch
    ///
    /// Batches are numbered from 1 in the order they are written.
    pub async fn write<R: AsRef<str>>(&mut self, batch: &[R]) -> anyhow::Result<()> {
        let mut contents = String::new();
        for record in batch {
            contents.push_str(record.as_ref());
            contents.push('\n');
        }

        let name = format!("batch-{:04}.txt", self.staged.len() + 1);
        let path = self.staging.path().join(&name);
        fs::write(&path, contents)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        debug!("Staged {} with {} records", name, batch.len());
        self.staged.push(name);
        Ok(())
    }

    /// Number of batches staged but not yet committed
    pub fn staged(&self) -> usize {
        self.staged.len()
    }

    /// Move every staged batch into the destination directory
    ///
    /// # Returns
    /// The number of batch files committed
    pub async fn commit(self) -> anyhow::Result<usize> {
        for name in &self.staged {
            let from = self.staging.path().join(name);
            let to = self.dir.join(name);
            fs::rename(&from, &to)
                .await
                .with_context(|| format!("failed to move {} into place", to.display()))?;
        }

        info!("Committed {} batch files to {}", self.staged.len(), self.dir.display());
        Ok(self.staged.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BatchError, BatchLimits,
        batch::{BatchPipeline, Batcher},
        size::json_line_size,
    };
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("read output dir")
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_commit_moves_batches_into_place() {
        let tmp = tempdir().expect("create temp dir");
        let out = tmp.path().join("batches");

        let mut writer = BatchWriter::create(&out).await.unwrap();
        writer.write(&["a", "b"]).await.unwrap();
        writer.write(&["c"]).await.unwrap();
        assert_eq!(writer.staged(), 2);
        assert!(entries(&out).iter().all(|name| !name.starts_with("batch-")));

        assert_eq!(writer.commit().await.unwrap(), 2);

        assert_eq!(entries(&out), vec!["batch-0001.txt", "batch-0002.txt"]);
        assert_eq!(std::fs::read_to_string(out.join("batch-0001.txt")).unwrap(), "a\nb\n");
        assert_eq!(std::fs::read_to_string(out.join("batch-0002.txt")).unwrap(), "c\n");
    }

    #[tokio::test]
    async fn test_uncommitted_writer_leaves_nothing_behind() {
        let tmp = tempdir().expect("create temp dir");

        let mut writer = BatchWriter::create(tmp.path()).await.unwrap();
        writer.write(&["a"]).await.unwrap();
        drop(writer);

        assert!(entries(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_measurement_failure_leaves_no_partial_batches() {
        let tmp = tempdir().expect("create temp dir");
        let batcher = Batcher::new(BatchLimits::new(100, 100, 1)).unwrap();
        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);

        for line in [r#"{"a":1}"#, r#"{"b":2}"#, "not json"] {
            in_tx.send(line.to_string()).await.unwrap();
        }
        drop(in_tx);

        let pipeline = BatchPipeline::try_new(batcher, |line: &String| json_line_size(line));
        let handle = tokio::spawn(pipeline.run(in_rx, out_tx));

        let mut writer = BatchWriter::create(tmp.path()).await.unwrap();
        while let Some(batch) = out_rx.recv().await {
            writer.write(&batch).await.unwrap();
        }
        // Only the batch closed before the bad line was forwarded
        assert_eq!(writer.staged(), 1);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BatchError>(),
            Some(BatchError::Measure { index: 2, .. })
        ));

        // The run failed, so the writer is dropped without committing
        drop(writer);
        assert!(entries(tmp.path()).is_empty());
    }
}
