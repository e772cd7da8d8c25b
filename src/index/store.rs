//! The SQLite-backed search index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row, Statement};
use tracing::{debug, info, warn};

use crate::config::PerformanceConfig;
use crate::error::{MailsiftError, Result};
use crate::index::compile::{compile_count, compile_page, DOCUMENT_COLUMNS};
use crate::index::schema;
use crate::model::document::EmailDocument;
use crate::search::query::SearchQuery;

/// Metadata key holding the schema version.
pub const META_SCHEMA_VERSION: &str = "schema_version";

const UPSERT_SQL: &str = r#"
INSERT INTO emails (
    message_id, file_path, from_address, from_name, to_addresses, cc_addresses,
    bcc_addresses, subject, date_sent, date_received, folder, account,
    has_attachments, attachment_names, body_preview, body_text, indexed_at,
    last_modified_ticks
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
ON CONFLICT(file_path) DO UPDATE SET
    message_id = excluded.message_id,
    from_address = excluded.from_address,
    from_name = excluded.from_name,
    to_addresses = excluded.to_addresses,
    cc_addresses = excluded.cc_addresses,
    bcc_addresses = excluded.bcc_addresses,
    subject = excluded.subject,
    date_sent = excluded.date_sent,
    date_received = excluded.date_received,
    folder = excluded.folder,
    account = excluded.account,
    has_attachments = excluded.has_attachments,
    attachment_names = excluded.attachment_names,
    body_preview = excluded.body_preview,
    body_text = excluded.body_text,
    indexed_at = excluded.indexed_at,
    last_modified_ticks = excluded.last_modified_ticks
RETURNING id
"#;

/// Connection tuning applied on open.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// SQLite page cache in KiB.
    pub cache_size_kib: i64,
    /// Wait time on a locked database.
    pub busy_timeout: Duration,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::from(&PerformanceConfig::default())
    }
}

impl From<&PerformanceConfig> for IndexOptions {
    fn from(cfg: &PerformanceConfig) -> Self {
        Self {
            cache_size_kib: cfg.cache_size_kib,
            busy_timeout: Duration::from_millis(cfg.busy_timeout_ms),
        }
    }
}

/// One matching document and its relevance score.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub document: EmailDocument,
    /// Higher is better; `None` unless the query had content terms.
    pub score: Option<f64>,
}

/// Durable full-text + structured index over email documents.
///
/// The index owns its connection until [`SearchIndex::close`]. All access is
/// serialized through one mutex, so a single handle is the single writer.
/// Concurrent readers open their own handle on the same file.
pub struct SearchIndex {
    path: Option<PathBuf>,
    conn: Mutex<Option<Connection>>,
}

impl SearchIndex {
    /// Open (or create) the index file at `path`.
    ///
    /// Call [`SearchIndex::initialize`] before first use.
    pub fn open(path: impl AsRef<Path>, options: &IndexOptions) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| MailsiftError::io(parent, e))?;
        }
        let conn = Connection::open(path)?;
        configure(&conn, options, true)?;
        debug!(path = %path.display(), "Opened search index");
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Open an existing index file for reading only.
    pub fn open_read_only(path: impl AsRef<Path>, options: &IndexOptions) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        configure(&conn, options, false)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Open a private in-memory index (tests and dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn, &IndexOptions::default(), true)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Location of the index file, `None` for in-memory indexes.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let conn = guard.as_mut().ok_or(MailsiftError::Closed)?;
        f(conn)
    }

    /// Create the schema if missing. Safe to call repeatedly.
    pub fn initialize(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(schema::CREATE)?;
            write_metadata(conn, META_SCHEMA_VERSION, &schema::SCHEMA_VERSION.to_string())?;
            Ok(())
        })
    }

    /// Insert or update one document keyed by its file path. Returns its id.
    pub fn upsert(&self, doc: &EmailDocument) -> Result<i64> {
        let ids = self.batch_upsert(std::slice::from_ref(doc))?;
        ids.into_iter()
            .next()
            .ok_or(MailsiftError::Database(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Insert or update all `docs` in one transaction.
    ///
    /// Either every document is written or, on the first failure, none is.
    /// Returns the row ids in input order.
    pub fn batch_upsert(&self, docs: &[EmailDocument]) -> Result<Vec<i64>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut ids = Vec::with_capacity(docs.len());
            {
                let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
                for doc in docs {
                    ids.push(upsert_with(&mut stmt, doc)?);
                }
            }
            tx.commit()?;
            debug!(count = docs.len(), "Committed batch");
            Ok(ids)
        })
    }

    /// Run `query` and return one page of hits.
    pub fn query(&self, query: &SearchQuery) -> Result<Vec<IndexHit>> {
        let compiled = compile_page(query);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&compiled.sql)?;
            let hits = stmt
                .query_map(params_from_iter(compiled.params.iter()), |row| {
                    let document = row_to_document(row)?;
                    let bm25: Option<f64> = row.get(19)?;
                    Ok(IndexHit {
                        document,
                        score: bm25.map(|s| -s),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(hits)
        })
    }

    /// Number of documents matching `query`, ignoring `skip`/`take`.
    pub fn total_count(&self, query: &SearchQuery) -> Result<u64> {
        let compiled = compile_count(query);
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                &compiled.sql,
                params_from_iter(compiled.params.iter()),
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
    }

    /// Look up the document stored for `path`.
    pub fn get_by_path(&self, path: &Path) -> Result<Option<EmailDocument>> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM emails e WHERE e.file_path = ?1");
        let key = path.to_string_lossy().into_owned();
        self.with_conn(|conn| {
            Ok(conn
                .query_row(&sql, params![key], row_to_document)
                .optional()?)
        })
    }

    /// Total number of indexed documents.
    pub fn email_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM emails", [], |r| r.get(0))?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
    }

    /// Size of the database in bytes (`page_count * page_size`).
    pub fn database_size(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let pages: i64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0))?;
            let page_size: i64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0))?;
            Ok(u64::try_from(pages.saturating_mul(page_size)).unwrap_or_default())
        })
    }

    /// Whether the index is reachable, initialized and passes `quick_check`.
    ///
    /// Storage errors are logged and reported as `false`, never returned.
    pub fn is_healthy(&self) -> bool {
        let result = self.with_conn(|conn| {
            conn.query_row("SELECT rowid FROM emails_fts LIMIT 1", [], |r| r.get::<_, i64>(0))
                .optional()?;
            let status: String = conn.query_row("PRAGMA quick_check", [], |r| r.get(0))?;
            Ok(status)
        });
        match result {
            Ok(status) if status == "ok" => true,
            Ok(status) => {
                warn!(status = %status, "Index integrity check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "Index health check failed");
                false
            }
        }
    }

    /// Read a metadata value.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM index_metadata WHERE key = ?1",
                    params![key],
                    |r| r.get(0),
                )
                .optional()?)
        })
    }

    /// Write a metadata value, replacing any previous one.
    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| write_metadata(conn, key, value))
    }

    /// Snapshot of every indexed path and its stored mtime ticks.
    pub fn known_files(&self) -> Result<HashMap<PathBuf, i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT file_path, last_modified_ticks FROM emails")?;
            let known = stmt
                .query_map([], |row| {
                    Ok((PathBuf::from(row.get::<_, String>(0)?), row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<HashMap<_, _>>>()?;
            Ok(known)
        })
    }

    /// Drop every table, trigger and index, then recreate the empty schema.
    ///
    /// Destructive: all documents and metadata are lost.
    pub fn rebuild(&self) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(schema::DROP)?;
            tx.execute_batch(schema::CREATE)?;
            write_metadata(&tx, META_SCHEMA_VERSION, &schema::SCHEMA_VERSION.to_string())?;
            tx.commit()?;
            Ok(())
        })?;
        info!(path = ?self.path, "Rebuilt search index schema");
        Ok(())
    }

    /// Merge FTS5 segments for faster queries.
    pub fn optimize(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO emails_fts(emails_fts) VALUES('optimize')", [])?;
            Ok(())
        })
    }

    /// Close the connection. Further calls are no-ops; other operations
    /// return [`MailsiftError::Closed`].
    pub fn close(&self) {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(conn) = conn {
            if let Err((_, e)) = conn.close() {
                warn!(error = %e, "Error closing search index");
            }
        }
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").field("path", &self.path).finish()
    }
}

fn configure(conn: &Connection, options: &IndexOptions, writable: bool) -> Result<()> {
    conn.busy_timeout(options.busy_timeout)?;
    conn.pragma_update(None, "cache_size", -options.cache_size_kib)?;
    if writable {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get(0))?;
        debug!(journal_mode = %mode, "Configured journal");
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
    }
    Ok(())
}

fn write_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO index_metadata (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn upsert_with(stmt: &mut Statement<'_>, doc: &EmailDocument) -> Result<i64> {
    let id = stmt.query_row(
        params![
            doc.message_id,
            doc.file_path.to_string_lossy().into_owned(),
            doc.from_address,
            doc.from_name,
            serde_json::to_string(&doc.to_addresses)?,
            serde_json::to_string(&doc.cc_addresses)?,
            serde_json::to_string(&doc.bcc_addresses)?,
            doc.subject,
            doc.date_sent.map(|d| d.timestamp()),
            doc.date_received.map(|d| d.timestamp()),
            doc.folder,
            doc.account,
            doc.has_attachments,
            serde_json::to_string(&doc.attachment_names)?,
            doc.body_preview,
            doc.body_text,
            doc.indexed_at.timestamp(),
            doc.last_modified_ticks,
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

/// Map a row selected with [`DOCUMENT_COLUMNS`].
fn row_to_document(row: &Row<'_>) -> rusqlite::Result<EmailDocument> {
    Ok(EmailDocument {
        id: Some(row.get(0)?),
        message_id: row.get(1)?,
        file_path: PathBuf::from(row.get::<_, String>(2)?),
        from_address: row.get(3)?,
        from_name: row.get(4)?,
        to_addresses: json_list(row, 5)?,
        cc_addresses: json_list(row, 6)?,
        bcc_addresses: json_list(row, 7)?,
        subject: row.get(8)?,
        date_sent: timestamp(row.get(9)?),
        date_received: timestamp(row.get(10)?),
        folder: row.get(11)?,
        account: row.get(12)?,
        has_attachments: row.get(13)?,
        attachment_names: json_list(row, 14)?,
        body_preview: row.get(15)?,
        body_text: row.get(16)?,
        indexed_at: timestamp(row.get(17)?).unwrap_or(DateTime::UNIX_EPOCH),
        last_modified_ticks: row.get(18)?,
    })
}
