//! Non-blocking mutual exclusion, one lock per target table.
//!
//! The run lock is the sole mechanism guaranteeing at most one in-flight sync
//! per table: scheduled firings and manual triggers both go through it. It is
//! in-process only and dies with the process, which is exactly the crash
//! semantics the single-host deployment needs; a TTL-based reclaim would be
//! the extension point for multi-host setups.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
struct Holder {
    token: Uuid,
    acquired_at: DateTime<Utc>,
}

type LockTable = Arc<Mutex<HashMap<String, Holder>>>;

/// Result of a lock acquisition attempt.
///
/// A typed result instead of a boolean, so call sites cannot accidentally
/// proceed without holding the lock.
#[derive(Debug)]
pub enum TryAcquire {
    /// The lock was acquired; the token releases it when dropped.
    Acquired(LockToken),
    /// Another holder is active for this table.
    Busy,
}

impl TryAcquire {
    /// Returns the token, if the lock was acquired.
    pub fn acquired(self) -> Option<LockToken> {
        match self {
            TryAcquire::Acquired(token) => Some(token),
            TryAcquire::Busy => None,
        }
    }

    /// Returns whether the lock was busy.
    pub fn is_busy(&self) -> bool {
        matches!(self, TryAcquire::Busy)
    }
}

/// Per-table non-blocking mutual exclusion.
///
/// `try_acquire` never waits: if another holder is active for the same table
/// it returns [`TryAcquire::Busy`] immediately. A scheduler must never block
/// its timer waiting for a previous run; skipping the firing is the correct
/// behavior when the next successful run is the source of truth.
#[derive(Debug, Clone, Default)]
pub struct RunLock {
    tables: LockTable,
}

impl RunLock {
    /// Creates a new lock registry with no held locks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to acquire the lock for `table_name` without blocking.
    pub fn try_acquire(&self, table_name: &str) -> TryAcquire {
        let mut tables = self
            .tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if tables.contains_key(table_name) {
            return TryAcquire::Busy;
        }

        let token = Uuid::new_v4();
        let acquired_at = Utc::now();
        tables.insert(
            table_name.to_string(),
            Holder { token, acquired_at },
        );

        debug!(table_name, %token, "run lock acquired");

        TryAcquire::Acquired(LockToken {
            table_name: table_name.to_string(),
            token,
            acquired_at,
            tables: self.tables.clone(),
        })
    }

    /// Releases a held token.
    ///
    /// Releasing is idempotent: a token whose lock was already released (or
    /// reclaimed) is a no-op, which covers a run that already failed and
    /// cleaned up after itself.
    pub fn release(&self, token: LockToken) {
        // Dropping performs the release; consuming the token by value makes a
        // second release unrepresentable.
        drop(token);
    }

    /// Returns whether a holder is currently active for `table_name`.
    pub fn is_locked(&self, table_name: &str) -> bool {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(table_name)
    }
}

/// Exclusive ownership of a table's run lock.
///
/// The lock is released when the token is dropped, so it can never leak past
/// the end of a run, including a panicking one.
#[derive(Debug)]
pub struct LockToken {
    table_name: String,
    token: Uuid,
    acquired_at: DateTime<Utc>,
    tables: LockTable,
}

impl LockToken {
    /// Returns the table this token locks.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns when the lock was acquired.
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

impl Drop for LockToken {
    fn drop(&mut self) {
        let mut tables = self
            .tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Only remove the entry if it still belongs to this token.
        if let Some(holder) = tables.get(&self.table_name)
            && holder.token == self.token
        {
            tables.remove(&self.table_name);
            debug!(table_name = %self.table_name, token = %self.token, "run lock released");
        }
    }
}
