//! Persistence contract (spec §6.1) and the shipped SQLite-backed adapter.
//!
//! `PersistenceAdapter` is the interface the store consumes — the core
//! never assumes a specific backing medium. The adapter stores opaque CRDT
//! update blobs, keyed by table id, so "different tables MUST use isolated
//! storage" (spec §6.1) falls directly out of a `WHERE table_id = ?`
//! filter rather than needing per-table databases.
//!
//! Grounded in the teacher's `db::Database::connect` (`db/mod.rs`): same
//! `SqliteConnectOptions` + WAL + busy-timeout + single-connection pool
//! shape, repointed at a one-table update log instead of a relational
//! domain schema. Snapshot compression reuses `flate2` + `base64` exactly
//! as the teacher's (unused-by-us) `UniverseSnapshot` feature already
//! pulled those crates in for.

use crate::error::PersistenceError;
use flate2::write::{GzDecoder, GzEncoder};
use flate2::Compression;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// The interface the replicated store (C1) consumes. An adapter is free to
/// store CRDT updates in any local durable medium keyed by table id (spec
/// §6.1). Native `async fn` in a trait is sufficient here — the adapter is
/// only ever driven through a concrete type, never behind `dyn`.
pub trait PersistenceAdapter {
    /// Every update blob persisted for this table, in append order.
    async fn load(&self) -> Result<Vec<Vec<u8>>, PersistenceError>;
    /// Appends one update blob.
    async fn persist(&self, update: &[u8]) -> Result<(), PersistenceError>;
    /// Fires once the adapter is ready to serve `load`/`persist` (e.g.
    /// after the connection pool and schema are established).
    async fn on_ready(&self) -> Result<(), PersistenceError>;
}

/// SQLite-backed adapter, grounded in the teacher's `db::Database`.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
    table_id: String,
}

impl SqlitePersistence {
    pub async fn connect(db_path: PathBuf, table_id: impl Into<String>) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(15))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS table_updates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                table_id TEXT NOT NULL,
                payload BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_table_updates_table_id ON table_updates(table_id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool, table_id: table_id.into() })
    }

    /// Collapses the update log for this table into one snapshot update,
    /// gzip-compressed and base64-framed, replacing the individual rows.
    /// Not required for correctness (replaying every update also works) —
    /// purely a storage-size optimization an adapter may run periodically.
    pub async fn compact(&self, snapshot_update: &[u8]) -> Result<(), PersistenceError> {
        let encoded = encode_snapshot(snapshot_update)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM table_updates WHERE table_id = ?")
            .bind(&self.table_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO table_updates (table_id, payload) VALUES (?, ?)")
            .bind(&self.table_id)
            .bind(encoded)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

impl PersistenceAdapter for SqlitePersistence {
    async fn load(&self) -> Result<Vec<Vec<u8>>, PersistenceError> {
        let rows = sqlx::query("SELECT payload FROM table_updates WHERE table_id = ? ORDER BY id ASC")
            .bind(&self.table_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let payload: Vec<u8> = row.try_get("payload").map_err(PersistenceError::from)?;
                decode_maybe_snapshot(&payload)
            })
            .collect()
    }

    async fn persist(&self, update: &[u8]) -> Result<(), PersistenceError> {
        sqlx::query("INSERT INTO table_updates (table_id, payload) VALUES (?, ?)")
            .bind(&self.table_id)
            .bind(update)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn on_ready(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

const SNAPSHOT_MAGIC: &[u8] = b"TASGZ1\0";

fn encode_snapshot(raw: &[u8]) -> Result<Vec<u8>, PersistenceError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw).map_err(|e| PersistenceError::Codec(e.to_string()))?;
    let gz = encoder.finish().map_err(|e| PersistenceError::Codec(e.to_string()))?;
    let mut framed = SNAPSHOT_MAGIC.to_vec();
    framed.extend_from_slice(&gz);
    Ok(framed)
}

fn decode_maybe_snapshot(payload: &[u8]) -> Result<Vec<u8>, PersistenceError> {
    if let Some(gz) = payload.strip_prefix(SNAPSHOT_MAGIC) {
        let mut decoder = GzDecoder::new(Vec::new());
        decoder.write_all(gz).map_err(|e| PersistenceError::Codec(e.to_string()))?;
        decoder.finish().map_err(|e| PersistenceError::Codec(e.to_string()))
    } else {
        Ok(payload.to_vec())
    }
}

/// In-memory adapter used by tests (spec §8 P2 persistence property,
/// `tests/properties.rs`) and by the binary harness when no on-disk path
/// is configured.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    updates: std::sync::Arc<tokio::sync::Mutex<Vec<Vec<u8>>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceAdapter for InMemoryPersistence {
    async fn load(&self) -> Result<Vec<Vec<u8>>, PersistenceError> {
        Ok(self.updates.lock().await.clone())
    }

    async fn persist(&self, update: &[u8]) -> Result<(), PersistenceError> {
        self.updates.lock().await.push(update.to_vec());
        Ok(())
    }

    async fn on_ready(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}
