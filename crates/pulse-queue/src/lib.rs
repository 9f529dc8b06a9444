//! Offline durability queue for undelivered heartbeats.
//!
//! Heartbeats that cannot be delivered immediately are parked in a local
//! SQLite store and replayed oldest-first once a send succeeds. Sequence
//! numbers come from `AUTOINCREMENT`, so they strictly increase, are never
//! reused, and survive process restarts.
//!
//! # Cross-process exclusion
//!
//! Each file event spawns a fresh agent invocation, so the store is shared
//! between concurrent short-lived processes. The queue holds an exclusive
//! lock on a sibling `.lock` file for its whole lifetime; a second
//! invocation blocks in [`Queue::open`] until the first one finishes.

use std::fs::{self, File};
use std::path::Path;

use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use pulse_core::Heartbeat;

/// Queue errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// An error from the underlying store.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to create or lock the queue directory.
    #[error("queue lock error: {0}")]
    Lock(#[source] std::io::Error),
    /// Failed to serialize a heartbeat for storage.
    #[error("failed to serialize heartbeat: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A stored heartbeat with its insertion sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedHeartbeat {
    pub seq: i64,
    pub heartbeat: Heartbeat,
}

/// Persistent FIFO store of pending heartbeats.
pub struct Queue {
    conn: Connection,
    // Held for the queue's lifetime; releases on drop.
    _lock: File,
    max_entries: usize,
}

impl Queue {
    /// Opens the queue at `path`, creating store and schema if necessary,
    /// and takes the cross-process lock.
    ///
    /// `max_entries` bounds the store; the oldest entries are evicted past
    /// it. Zero means unbounded.
    pub fn open(path: &Path, max_entries: usize) -> Result<Self, QueueError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(QueueError::Lock)?;
        }

        let lock = File::create(lock_path(path)).map_err(QueueError::Lock)?;
        lock.lock_exclusive().map_err(QueueError::Lock)?;

        let conn = Connection::open(path)?;
        let queue = Self {
            conn,
            _lock: lock,
            max_entries,
        };
        queue.init()?;
        Ok(queue)
    }

    fn init(&self) -> Result<(), QueueError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS heartbeats (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                payload TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Durably appends a heartbeat, evicting the oldest entries beyond the
    /// retention cap. Returns only after the write is committed.
    pub fn push(&mut self, heartbeat: &Heartbeat) -> Result<(), QueueError> {
        let payload = serde_json::to_string(heartbeat)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO heartbeats (payload) VALUES (?)",
            params![payload],
        )?;
        if self.max_entries > 0 {
            tx.execute(
                "
                DELETE FROM heartbeats WHERE seq NOT IN (
                    SELECT seq FROM heartbeats ORDER BY seq DESC LIMIT ?
                )
                ",
                params![self.max_entries as i64],
            )?;
        }
        tx.commit()?;
        tracing::debug!("queued heartbeat for later delivery");
        Ok(())
    }

    /// Returns the oldest entry without removing it.
    ///
    /// Corrupt entries are dropped with a warning and never surface; the
    /// next readable entry is returned instead.
    pub fn peek(&mut self) -> Result<Option<QueuedHeartbeat>, QueueError> {
        loop {
            let row: Option<(i64, String)> = self
                .conn
                .query_row(
                    "SELECT seq, payload FROM heartbeats ORDER BY seq ASC LIMIT 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((seq, payload)) = row else {
                return Ok(None);
            };
            match serde_json::from_str(&payload) {
                Ok(heartbeat) => return Ok(Some(QueuedHeartbeat { seq, heartbeat })),
                Err(err) => {
                    tracing::warn!(seq, "dropping corrupt queue entry: {err}");
                    self.remove(seq)?;
                }
            }
        }
    }

    /// Removes a previously peeked entry after successful delivery.
    pub fn remove(&mut self, seq: i64) -> Result<(), QueueError> {
        self.conn
            .execute("DELETE FROM heartbeats WHERE seq = ?", params![seq])?;
        Ok(())
    }

    /// Atomically removes and returns the oldest entry.
    pub fn pop(&mut self) -> Result<Option<QueuedHeartbeat>, QueueError> {
        let Some(queued) = self.peek()? else {
            return Ok(None);
        };
        self.remove(queued.seq)?;
        Ok(Some(queued))
    }

    /// Number of pending heartbeats.
    pub fn len(&self) -> Result<usize, QueueError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM heartbeats", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Whether the queue has no pending heartbeats.
    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }
}

fn lock_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}
