use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::SyncResult;
#[cfg(any(test, feature = "test-utils"))]
use crate::{bail, error::ErrorKind};

#[derive(Debug)]
struct Inner {
    checkpoints: HashMap<String, Checkpoint>,
    #[cfg(any(test, feature = "test-utils"))]
    fail_saves: bool,
}

/// In-memory checkpoint store for testing and development.
///
/// All checkpoints are lost when the process terminates. Behaves exactly like
/// a durable store otherwise, including whole-record replacement on save.
#[derive(Debug, Clone)]
pub struct MemoryCheckpointStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryCheckpointStore {
    /// Creates a new empty memory checkpoint store.
    pub fn new() -> Self {
        let inner = Inner {
            checkpoints: HashMap::new(),
            #[cfg(any(test, feature = "test-utils"))]
            fail_saves: false,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Makes every subsequent `save` fail, to exercise the engine's degraded
    /// in-memory checkpoint path.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn fail_saves(&self, fail: bool) {
        let mut inner = self.inner.lock().await;
        inner.fail_saves = fail;
    }
}

impl Default for MemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, table_name: &str) -> SyncResult<Option<Checkpoint>> {
        let inner = self.inner.lock().await;

        Ok(inner.checkpoints.get(table_name).cloned())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        #[cfg(any(test, feature = "test-utils"))]
        if inner.fail_saves {
            bail!(ErrorKind::IoError, "Checkpoint save failure injected");
        }

        inner
            .checkpoints
            .insert(checkpoint.table_name.clone(), checkpoint.clone());

        Ok(())
    }

    async fn reset(&self, table_name: &str) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.checkpoints.remove(table_name);

        Ok(())
    }
}
