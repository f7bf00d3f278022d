use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::debug;

use crate::db::codec;
use crate::db::IngestRunRecord;
use crate::model::StoredFunction;

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB) or an unversioned store that already
/// has a `functions` table.
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Rows fetched per round trip by `iter_all`.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Error type for fingerprint store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A bulk insert failed; nothing from that batch was committed.
    #[error("Failed to write fingerprints: {0}")]
    Write(#[source] rusqlite::Error),

    #[error("Fingerprint store is closed")]
    Closed,

    #[error("Failed to compress instruction stream: {0}")]
    Compress(#[source] std::io::Error),

    #[error("Corrupt instruction blob in row {row_id}: {source}")]
    Codec {
        row_id: i64,
        #[source]
        source: std::io::Error,
    },

    #[error("Token {token:?} cannot be stored (empty or contains the ',' delimiter)")]
    InvalidToken { token: String },

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// SQLite-backed store of compressed function fingerprints.
///
/// Writes take `&mut self`, so a handle has at most one writer at a time.
/// Reads borrow the handle and may be issued repeatedly once writes commit.
#[derive(Debug)]
pub struct FingerprintStore {
    conn: Option<Connection>,
    path: Option<PathBuf>,
}

impl FingerprintStore {
    /// Open (or create) a store at the given path and ensure the schema exists.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn: Some(conn), path: Some(path.to_path_buf()) })
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn: Some(conn), path: None })
    }

    /// Database path, if the store is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Expose the underlying connection for advanced callers.
    /// For most code, prefer higher-level helpers.
    pub fn connection(&self) -> StoreResult<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    pub fn schema_version(&self) -> StoreResult<i32> {
        current_schema_version(self.connection()?)
    }

    /// Compress and append all records in a single transaction.
    ///
    /// Either every record becomes visible or none does. Returns the number of
    /// rows written.
    pub fn insert_many(&mut self, records: &[StoredFunction]) -> StoreResult<usize> {
        self.write_batch(records, None)
    }

    /// Like `insert_many`, but the ingest-run record commits in the same
    /// transaction, so a failed run leaves neither rows nor bookkeeping.
    pub fn insert_many_with_run(
        &mut self,
        records: &[StoredFunction],
        run: &IngestRunRecord,
    ) -> StoreResult<usize> {
        self.write_batch(records, Some(run))
    }

    fn write_batch(
        &mut self,
        records: &[StoredFunction],
        run: Option<&IngestRunRecord>,
    ) -> StoreResult<usize> {
        // Encode everything up front so bad input never opens a transaction.
        let encoded = records
            .iter()
            .map(|r| codec::encode_tokens(&r.instructions))
            .collect::<StoreResult<Vec<_>>>()?;

        let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
        let tx = conn.transaction().map_err(StoreError::Write)?;
        {
            let mut stmt = tx
                .prepare(
                    r#"
                    INSERT INTO functions (uuid, name, instr, digest)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                )
                .map_err(StoreError::Write)?;
            for (record, enc) in records.iter().zip(&encoded) {
                stmt.execute(params![record.identifier, record.name, enc.blob, enc.digest])
                    .map_err(StoreError::Write)?;
            }
        }
        if let Some(run) = run {
            insert_run_row(&tx, run)?;
        }
        tx.commit().map_err(StoreError::Write)?;

        debug!(rows = records.len(), "committed fingerprints");
        Ok(records.len())
    }

    /// Stream every stored record in insertion order, decompressing on read.
    ///
    /// Each call starts a fresh scan from the first row.
    pub fn iter_all(&self) -> StoreResult<FingerprintIter<'_>> {
        self.iter_all_paged(DEFAULT_PAGE_SIZE)
    }

    /// Like `iter_all`, with an explicit page size (clamped to at least 1).
    pub fn iter_all_paged(&self, page_size: usize) -> StoreResult<FingerprintIter<'_>> {
        let conn = self.connection()?;
        Ok(FingerprintIter {
            conn,
            last_id: i64::MIN,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            exhausted: false,
        })
    }

    /// Number of stored functions.
    pub fn count(&self) -> StoreResult<u64> {
        let n: i64 = self.connection()?.query_row("SELECT COUNT(*) FROM functions", [], |row| {
            row.get(0)
        })?;
        Ok(n as u64)
    }

    /// Whether a function with this token-stream digest is already stored.
    pub fn contains_digest(&self, digest: &str) -> StoreResult<bool> {
        let mut stmt = self
            .connection()?
            .prepare_cached("SELECT 1 FROM functions WHERE digest = ?1 LIMIT 1")?;
        Ok(stmt.exists(params![digest])?)
    }

    /// Insert an ingestion bookkeeping record and return its row id.
    pub fn insert_ingest_run(&mut self, record: &IngestRunRecord) -> StoreResult<i64> {
        let conn = self.connection()?;
        insert_run_row(conn, record)?;
        Ok(conn.last_insert_rowid())
    }

    /// List ingestion runs (ordered by id).
    pub fn list_ingest_runs(&self) -> StoreResult<Vec<IngestRunRecord>> {
        let mut stmt = self.connection()?.prepare(
            r#"
            SELECT source, function_count, started_at, finished_at
            FROM ingest_runs
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(IngestRunRecord {
                source: row.get(0)?,
                function_count: row.get::<_, i64>(1)? as u64,
                started_at: row.get(2)?,
                finished_at: row.get(3)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Release the connection. Later operations fail with `StoreError::Closed`.
    pub fn close(&mut self) -> StoreResult<()> {
        let conn = self.conn.take().ok_or(StoreError::Closed)?;
        conn.close().map_err(|(_, e)| StoreError::Sql(e))
    }
}

/// Lazy cursor over the `functions` table.
///
/// Rows are fetched in pages keyed on `id`, so no statement stays open between
/// pages and dropping the iterator early leaves nothing to clean up.
pub struct FingerprintIter<'a> {
    conn: &'a Connection,
    last_id: i64,
    page_size: usize,
    buffer: VecDeque<RawRow>,
    exhausted: bool,
}

struct RawRow {
    id: i64,
    name: String,
    uuid: String,
    instr: Vec<u8>,
}

impl FingerprintIter<'_> {
    fn fill(&mut self) -> StoreResult<()> {
        let conn = self.conn;
        let mut stmt = conn.prepare_cached(
            r#"
            SELECT id, name, uuid, instr FROM functions
            WHERE id > ?1
            ORDER BY id
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![self.last_id, self.page_size as i64], |row| {
            Ok(RawRow { id: row.get(0)?, name: row.get(1)?, uuid: row.get(2)?, instr: row.get(3)? })
        })?;
        for row in rows {
            self.buffer.push_back(row?);
        }
        if self.buffer.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = self.buffer.back() {
            self.last_id = last.id;
        }
        Ok(())
    }
}

impl Iterator for FingerprintIter<'_> {
    type Item = StoreResult<StoredFunction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        let row = self.buffer.pop_front()?;
        Some(
            codec::decode_tokens(&row.instr)
                .map(|instructions| StoredFunction {
                    name: row.name,
                    identifier: row.uuid,
                    instructions,
                })
                .map_err(|source| StoreError::Codec { row_id: row.id, source }),
        )
    }
}

fn insert_run_row(conn: &Connection, record: &IngestRunRecord) -> StoreResult<()> {
    conn.execute(
        r#"
        INSERT INTO ingest_runs (source, function_count, started_at, finished_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![record.source, record.function_count as i64, record.started_at, record.finished_at],
    )
    .map_err(StoreError::Write)?;
    Ok(())
}

/// Apply schema migrations to bring the database to the latest version.
///
/// We use `PRAGMA user_version` as the schema version indicator.
///
/// Version map:
/// - 0: no schema (or an unversioned `functions` table)
/// - 1: `functions` table
/// - 2: `digest` column + index on `functions`, backfilled for existing rows
/// - 3: `ingest_runs` table
fn apply_migrations(conn: &Connection) -> StoreResult<()> {
    let mut current_version = current_schema_version(conn)?;

    // Reject DBs created with a newer schema than we support.
    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS functions (
                id    INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid  TEXT NOT NULL,
                name  TEXT NOT NULL,
                instr BLOB NOT NULL
            );

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
        current_version = 1;
    }

    if current_version < 2 {
        if !column_exists(conn, "functions", "digest")? {
            conn.execute("ALTER TABLE functions ADD COLUMN digest TEXT;", [])?;
        }
        backfill_digests(conn)?;
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE INDEX IF NOT EXISTS idx_functions_digest ON functions(digest);
            PRAGMA user_version = 2;
            COMMIT;
            "#,
        )?;
        current_version = 2;
    }

    if current_version < 3 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS ingest_runs (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                source         TEXT NOT NULL,
                function_count INTEGER NOT NULL,
                started_at     TEXT NOT NULL,
                finished_at    TEXT NOT NULL
            );

            PRAGMA user_version = 3;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Compute digests for rows written before the column existed.
fn backfill_digests(conn: &Connection) -> StoreResult<()> {
    let pending: Vec<(i64, Vec<u8>)> = {
        let mut stmt = conn.prepare("SELECT id, instr FROM functions WHERE digest IS NULL")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<_, _>>()?
    };
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare("UPDATE functions SET digest = ?1 WHERE id = ?2")?;
        for (id, blob) in &pending {
            let text = codec::decompress(blob)
                .map_err(|source| StoreError::Codec { row_id: *id, source })?;
            stmt.execute(params![codec::digest(&text), id])?;
        }
    }
    tx.commit()?;
    debug!(rows = pending.len(), "backfilled fingerprint digests");
    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> StoreResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let pragma = format!("PRAGMA table_info({table});");
    let mut stmt = conn.prepare(&pragma)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in rows {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
