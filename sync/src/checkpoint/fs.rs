use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::SyncResult;

/// Filesystem checkpoint store, one JSON file per destination table.
///
/// Saves write the full record to a temporary file and rename it into place,
/// so a crash mid-write leaves either the old record or the new one, never a
/// mix. Unreadable or corrupt files are logged and treated as "no checkpoint";
/// they never fail a run at startup.
#[derive(Debug, Clone)]
pub struct FsCheckpointStore {
    dir: PathBuf,
}

impl FsCheckpointStore {
    /// Creates a store rooted at `dir`. The directory is created lazily on the
    /// first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, table_name: &str) -> PathBuf {
        self.dir.join(format!("{table_name}.json"))
    }
}

impl CheckpointStore for FsCheckpointStore {
    async fn load(&self, table_name: &str) -> SyncResult<Option<Checkpoint>> {
        let path = self.path_for(table_name);

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                warn!(
                    table_name,
                    path = %path.display(),
                    error = %err,
                    "checkpoint file unreadable, starting from scratch"
                );
                return Ok(None);
            }
        };

        match serde_json::from_str::<Checkpoint>(&contents) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(err) => {
                warn!(
                    table_name,
                    path = %path.display(),
                    error = %err,
                    "checkpoint file corrupt, starting from scratch"
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, checkpoint: &Checkpoint) -> SyncResult<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(&checkpoint.table_name);
        let tmp_path = temp_sibling(&path);

        let serialized = serde_json::to_vec_pretty(checkpoint)?;
        fs::write(&tmp_path, &serialized).await?;

        // Rename within the same directory so the replacement is atomic.
        if let Err(err) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        Ok(())
    }

    async fn reset(&self, table_name: &str) -> SyncResult<()> {
        let path = self.path_for(table_name);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    file_name.push(format!(".{}.tmp", Uuid::new_v4()));
    path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Watermark;

    #[tokio::test]
    async fn round_trips_a_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());

        let mut checkpoint = Checkpoint::new("orders");
        checkpoint.advance_to(Watermark::Int(42));
        checkpoint.row_count = 42;
        store.save(&checkpoint).await.unwrap();

        let loaded = store.load("orders").await.unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());

        assert_eq!(store.load("orders").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());

        tokio::fs::write(dir.path().join("orders.json"), b"{half a record")
            .await
            .unwrap();

        assert_eq!(store.load("orders").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());

        store.save(&Checkpoint::new("orders")).await.unwrap();
        store.save(&Checkpoint::new("orders")).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = vec![];
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().into_string().unwrap());
        }
        assert_eq!(names, vec!["orders.json".to_string()]);
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());

        store.save(&Checkpoint::new("orders")).await.unwrap();
        store.reset("orders").await.unwrap();
        store.reset("orders").await.unwrap();

        assert_eq!(store.load("orders").await.unwrap(), None);
    }
}
