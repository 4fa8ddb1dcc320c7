//! Resumable write-through record cache over SQLite.
//!
//! Every record an adapter emits is upserted under `(store, cache_key)` so an
//! interrupted crawl can reseed its buffer from the last durable state.
//! Writes are buffered in memory and applied in one short `BEGIN IMMEDIATE ..
//! COMMIT` every `commit_interval` records, so the database write lock is
//! held only for the duration of a commit, never across fetches. After a
//! fully successful pass, [`CatalogCache::reconcile`] evicts rows whose key
//! the crawl no longer produced.

mod schema;

pub use schema::initialize_schema;

use crate::record::CatalogRecord;
use crate::{CatalogError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, TransactionBehavior};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Commit after this many buffered writes unless configured otherwise.
pub const DEFAULT_COMMIT_INTERVAL: u32 = 50;

/// Bounded retry for a busy write transaction: 5 attempts, 0.1s initial,
/// doubling.
const FLUSH_ATTEMPTS: u32 = 5;
const FLUSH_INITIAL_DELAY: Duration = Duration::from_millis(100);

/// How long SQLite itself waits on a locked database before reporting busy.
/// Kept short; the bounded retry above owns the real backoff schedule.
const BUSY_TIMEOUT: Duration = Duration::from_millis(100);

const UPSERT_SQL: &str = "INSERT INTO cached_records (store, cache_key, payload, updated_at)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(store, cache_key)
     DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at";

struct PendingRow {
    store: String,
    cache_key: String,
    payload: String,
    updated_at: String,
}

/// Write-through cache for one store task.
///
/// Each concurrent store task opens its own connection; safety over a shared
/// database file is SQLite's locking plus the bounded retry around every
/// write transaction. Between flushes no lock is held at all, so sibling
/// tasks writing to the same file only ever contend for the brief commit
/// window. The `Drop` impl applies buffered writes best-effort so no exit
/// path, including cancellation, loses them.
pub struct CatalogCache {
    conn: Connection,
    commit_interval: u32,
    pending: Vec<PendingRow>,
}

impl CatalogCache {
    /// Opens (or creates) the cache database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for concurrent store tasks sharing one file
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            commit_interval: DEFAULT_COMMIT_INTERVAL,
            pending: Vec::new(),
        })
    }

    /// Creates an in-memory cache (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            commit_interval: DEFAULT_COMMIT_INTERVAL,
            pending: Vec::new(),
        })
    }

    /// Sets how many buffered writes trigger an automatic flush.
    pub fn with_commit_interval(mut self, interval: u32) -> Self {
        self.commit_interval = interval.max(1);
        self
    }

    /// Loads every cached record for `store`.
    ///
    /// Rows whose payload no longer deserializes are deleted and not
    /// returned, so one corrupt write cannot poison every later resume.
    pub fn load(&mut self, store: &str) -> Result<Vec<CatalogRecord>> {
        let mut records = Vec::new();
        let mut corrupt: Vec<i64> = Vec::new();

        {
            let mut stmt = self
                .conn
                .prepare("SELECT id, payload FROM cached_records WHERE store = ?1 ORDER BY id")?;
            let rows = stmt.query_map(params![store], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;

            for row in rows {
                let (id, payload) = row?;
                match serde_json::from_str::<CatalogRecord>(&payload) {
                    Ok(record) => records.push(record),
                    Err(err) => {
                        tracing::warn!(store, id, error = %err, "dropping corrupt cache payload");
                        corrupt.push(id);
                    }
                }
            }
        }

        for id in corrupt {
            self.conn
                .execute("DELETE FROM cached_records WHERE id = ?1", params![id])?;
        }

        Ok(records)
    }

    /// Buffers an insert-or-update for the record's `(store, cache_key)`,
    /// stamped with the current time. The write reaches the database at the
    /// next flush; this call itself touches no lock.
    pub async fn upsert(&mut self, record: &CatalogRecord) -> Result<()> {
        self.pending.push(PendingRow {
            store: record.store.clone(),
            cache_key: record.cache_key(),
            payload: serde_json::to_string(record)?,
            updated_at: Utc::now().to_rfc3339(),
        });

        if self.pending.len() as u32 >= self.commit_interval {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flushes, then deletes every row for `store` whose key is not in
    /// `live_keys`. Returns the number of evicted rows.
    ///
    /// Only call this after a fully successful pass. After a partial pass it
    /// would evict live entries the crawl simply never reached.
    pub async fn reconcile(&mut self, store: &str, live_keys: &HashSet<String>) -> Result<usize> {
        self.flush().await?;

        let cached_keys: Vec<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT cache_key FROM cached_records WHERE store = ?1")?;
            let rows = stmt.query_map(params![store], |row| row.get(0))?;
            rows.collect::<std::result::Result<_, _>>()?
        };
        let stale: Vec<String> = cached_keys
            .into_iter()
            .filter(|key| !live_keys.contains(key))
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }

        let evicted = with_write_retry("reconcile", &mut self.conn, |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut evicted = 0;
            for key in &stale {
                evicted += tx.execute(
                    "DELETE FROM cached_records WHERE store = ?1 AND cache_key = ?2",
                    params![store, key],
                )?;
            }
            tx.commit()?;
            Ok(evicted)
        })
        .await?;

        tracing::debug!(store, evicted, "evicted stale cache entries");
        Ok(evicted)
    }

    /// Applies every buffered write in one short transaction, retrying the
    /// whole transaction on a busy/locked database with bounded exponential
    /// backoff before propagating [`CatalogError::CacheContention`]. On
    /// failure the buffer is kept, so a later flush (or `Drop`) can try
    /// again.
    pub async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = &self.pending;
        with_write_retry("flush", &mut self.conn, |conn| apply_rows(conn, pending)).await?;
        self.pending.clear();
        Ok(())
    }

    /// Flushes and releases the connection. Call on every exit path; if an
    /// error prevented calling it, `Drop` still applies the buffer
    /// best-effort.
    pub async fn close(mut self) -> Result<()> {
        self.flush().await
    }
}

impl Drop for CatalogCache {
    fn drop(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        // Single uncontended attempt; Drop cannot await the retry schedule.
        let pending = std::mem::take(&mut self.pending);
        if let Err(err) = apply_rows(&mut self.conn, &pending) {
            tracing::warn!(error = %err, "failed to persist buffered cache writes on drop");
        }
    }
}

/// One write transaction: `BEGIN IMMEDIATE`, all upserts, `COMMIT`. A busy
/// error at any step rolls the transaction back (via the `Transaction` drop)
/// and surfaces to the retry loop.
fn apply_rows(conn: &mut Connection, rows: &[PendingRow]) -> rusqlite::Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for row in rows {
        tx.execute(
            UPSERT_SQL,
            params![row.store, row.cache_key, row.payload, row.updated_at],
        )?;
    }
    tx.commit()
}

async fn with_write_retry<T>(
    context: &'static str,
    conn: &mut Connection,
    mut op: impl FnMut(&mut Connection) -> rusqlite::Result<T>,
) -> Result<T> {
    let mut delay = FLUSH_INITIAL_DELAY;
    for attempt in 1..=FLUSH_ATTEMPTS {
        match op(conn) {
            Ok(value) => return Ok(value),
            Err(err) if is_busy(&err) && attempt < FLUSH_ATTEMPTS => {
                tracing::debug!(
                    context,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "cache write busy, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) if is_busy(&err) => {
                return Err(CatalogError::CacheContention {
                    attempts: FLUSH_ATTEMPTS,
                });
            }
            Err(err) => return Err(err.into()),
        }
    }
    unreachable!("retry loop always returns")
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == ErrorCode::DatabaseBusy || code.code == ErrorCode::DatabaseLocked
    )
}
