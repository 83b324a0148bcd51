//! SQLite database layer for clipboard storage
//!
//! One `clipboard_items` table keyed by a unique content hash, plus a
//! key/value `settings` table.
//! Uses r2d2 connection pooling to allow concurrent reads without mutex blocking.

use crate::interface::{CapturePayload, ClipboardItem, ContentType};
use crate::models::{format_db_timestamp, parse_db_timestamp, RetentionPolicy};
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

const ITEM_COLUMNS: &str = "id, content_type, content_hash, text_content, image_path, thumbnail_path, file_size, source_app, created_at, updated_at";

/// Image files released by a deleted row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictedItem {
    pub id: i64,
    pub image_path: Option<String>,
    pub thumbnail_path: Option<String>,
}

impl EvictedItem {
    pub fn has_files(&self) -> bool {
        self.image_path.is_some() || self.thumbnail_path.is_some()
    }
}

/// Result of an upsert and the sweep that followed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub item_id: i64,
    pub inserted: bool,
    pub evicted: Vec<EvictedItem>,
}

/// Thread-safe database wrapper using connection pooling
///
/// Uses r2d2 connection pool for concurrent read access.
/// WAL mode enables readers to proceed without blocking each other.
/// Writes are serialized by the store, not here.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create a database at the given path with connection pooling
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA busy_timeout=5000;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory();

        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Get a connection from the pool
    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS clipboard_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_type TEXT NOT NULL,
                content_hash TEXT NOT NULL UNIQUE,
                text_content TEXT,
                image_path TEXT,
                thumbnail_path TEXT,
                file_size INTEGER NOT NULL DEFAULT 0,
                source_app TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_updated_at ON clipboard_items(updated_at DESC);

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a capture or touch the row sharing its hash, then sweep.
    /// Runs as a single transaction.
    pub fn upsert_item(
        &self,
        payload: &CapturePayload,
        now: DateTime<Utc>,
        policy: &RetentionPolicy,
    ) -> DatabaseResult<UpsertOutcome> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let now_str = format_db_timestamp(now);

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM clipboard_items WHERE content_hash = ?1",
                [&payload.content_hash],
                |row| row.get(0),
            )
            .optional()?;

        let (item_id, inserted) = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE clipboard_items SET updated_at = ?1 WHERE id = ?2",
                    params![now_str, id],
                )?;
                (id, false)
            }
            None => {
                tx.execute(
                    r#"INSERT INTO clipboard_items
                       (content_type, content_hash, text_content, image_path, thumbnail_path, file_size, source_app, created_at, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)"#,
                    params![
                        payload.content_type.database_type(),
                        payload.content_hash,
                        payload.text_content,
                        payload.image_path,
                        payload.thumbnail_path,
                        payload.file_size,
                        payload.source_app,
                        now_str,
                    ],
                )?;
                (tx.last_insert_rowid(), true)
            }
        };

        let evicted = Self::apply_retention(&tx, policy, now)?;
        tx.commit()?;

        Ok(UpsertOutcome {
            item_id,
            inserted,
            evicted,
        })
    }

    /// Bump `updated_at` of the row with this hash. Returns its id if present.
    pub fn touch_by_hash(&self, hash: &str, now: DateTime<Utc>) -> DatabaseResult<Option<i64>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let id: Option<i64> = tx
            .query_row(
                "SELECT id FROM clipboard_items WHERE content_hash = ?1",
                [hash],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = id {
            tx.execute(
                "UPDATE clipboard_items SET updated_at = ?1 WHERE id = ?2",
                params![format_db_timestamp(now), id],
            )?;
        }
        tx.commit()?;
        Ok(id)
    }

    /// Run the retention sweep on its own
    pub fn sweep(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> DatabaseResult<Vec<EvictedItem>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let evicted = Self::apply_retention(&tx, policy, now)?;
        tx.commit()?;
        Ok(evicted)
    }

    /// Capacity eviction, then age eviction. Deleting nothing on a compliant
    /// table makes repeated runs harmless.
    fn apply_retention(
        conn: &Connection,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Vec<EvictedItem>> {
        let max_items = policy.max_items.max(0);

        let mut evicted = Self::collect_evicted(
            conn,
            "SELECT id, image_path, thumbnail_path FROM clipboard_items
             ORDER BY updated_at DESC, id DESC LIMIT -1 OFFSET ?1",
            params![max_items],
        )?;
        if !evicted.is_empty() {
            conn.execute(
                "DELETE FROM clipboard_items WHERE id IN (
                    SELECT id FROM clipboard_items
                    ORDER BY updated_at DESC, id DESC LIMIT -1 OFFSET ?1
                 )",
                params![max_items],
            )?;
        }

        let cutoff = format_db_timestamp(policy.age_cutoff(now));
        let expired = Self::collect_evicted(
            conn,
            "SELECT id, image_path, thumbnail_path FROM clipboard_items WHERE updated_at < ?1",
            params![cutoff],
        )?;
        if !expired.is_empty() {
            conn.execute(
                "DELETE FROM clipboard_items WHERE updated_at < ?1",
                params![cutoff],
            )?;
            evicted.extend(expired);
        }

        Ok(evicted)
    }

    fn collect_evicted(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> DatabaseResult<Vec<EvictedItem>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(EvictedItem {
                    id: row.get(0)?,
                    image_path: row.get(1)?,
                    thumbnail_path: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete an item by ID. Returns whether a row was removed.
    pub fn delete_item(&self, id: i64) -> DatabaseResult<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute("DELETE FROM clipboard_items WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    /// Delete all items, returning their image files
    pub fn clear_all(&self) -> DatabaseResult<Vec<EvictedItem>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let removed = Self::collect_evicted(
            &tx,
            "SELECT id, image_path, thumbnail_path FROM clipboard_items",
            params![],
        )?;
        tx.execute("DELETE FROM clipboard_items", [])?;
        tx.commit()?;
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Most recently updated items first, ties by newest id
    pub fn fetch_recent(&self, limit: usize) -> DatabaseResult<Vec<ClipboardItem>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM clipboard_items ORDER BY updated_at DESC, id DESC LIMIT ?1",
            ITEM_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![limit as i64], Self::row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Items whose text contains `needle`, ASCII case-insensitive, same order
    /// as `fetch_recent`. The needle is matched literally at any length.
    /// Rows without text never match.
    pub fn search_text(&self, needle: &str, limit: usize) -> DatabaseResult<Vec<ClipboardItem>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT {} FROM clipboard_items
               WHERE text_content IS NOT NULL AND instr(lower(text_content), lower(?1)) > 0
               ORDER BY updated_at DESC, id DESC LIMIT ?2"#,
            ITEM_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![needle, limit as i64], Self::row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn get_item(&self, id: i64) -> DatabaseResult<Option<ClipboardItem>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM clipboard_items WHERE id = ?1", ITEM_COLUMNS);
        let item = conn.query_row(&sql, [id], Self::row_to_item).optional()?;
        Ok(item)
    }

    /// Find an existing item by content hash
    pub fn find_by_hash(&self, hash: &str) -> DatabaseResult<Option<ClipboardItem>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM clipboard_items WHERE content_hash = ?1",
            ITEM_COLUMNS
        );
        let item = conn.query_row(&sql, [hash], Self::row_to_item).optional()?;
        Ok(item)
    }

    /// Get total number of items in the database
    pub fn count_items(&self) -> DatabaseResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM clipboard_items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Newest `updated_at` in the table, used to seed the store's stamp clock
    pub fn latest_update(&self) -> DatabaseResult<Option<DateTime<Utc>>> {
        let conn = self.get_conn()?;
        let latest: Option<String> =
            conn.query_row("SELECT MAX(updated_at) FROM clipboard_items", [], |row| row.get(0))?;
        Ok(latest.as_deref().and_then(parse_db_timestamp))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Settings
    // ─────────────────────────────────────────────────────────────────────────

    pub fn load_settings(&self) -> DatabaseResult<Vec<(String, String)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    pub fn put_setting(&self, key: &str, value: &str) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<ClipboardItem> {
        let content_type: String = row.get(1)?;

        Ok(ClipboardItem {
            id: row.get(0)?,
            content_type: ContentType::from_database(&content_type),
            content_hash: row.get(2)?,
            text_content: row.get(3)?,
            image_path: row.get(4)?,
            thumbnail_path: row.get(5)?,
            file_size: row.get(6)?,
            source_app: row.get(7)?,
            created_at: Self::row_timestamp(row, 8)?,
            updated_at: Self::row_timestamp(row, 9)?,
        })
    }

    /// Unparseable stamps are reported instead of replaced, since SQL orders by the raw text
    fn row_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
        let raw: String = row.get(idx)?;
        parse_db_timestamp(&raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                format!("invalid timestamp '{}'", raw).into(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn policy(max_items: i64, max_days: i64) -> RetentionPolicy {
        RetentionPolicy { max_items, max_days }
    }

    #[test]
    fn test_insert_then_touch_same_hash() {
        let db = Database::open_in_memory().unwrap();
        let payload = CapturePayload::text("hello", None);

        let first = db.upsert_item(&payload, t0(), &policy(100, 30)).unwrap();
        assert!(first.inserted);

        let later = t0() + Duration::seconds(5);
        let second = db.upsert_item(&payload, later, &policy(100, 30)).unwrap();
        assert!(!second.inserted);
        assert_eq!(first.item_id, second.item_id);
        assert_eq!(db.count_items().unwrap(), 1);

        let item = db.get_item(first.item_id).unwrap().unwrap();
        assert_eq!(item.created_at, t0());
        assert_eq!(item.updated_at, later);
    }

    #[test]
    fn test_capacity_sweep_keeps_most_recent() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            let payload = CapturePayload::text(format!("item {}", i), None);
            db.upsert_item(&payload, t0() + Duration::seconds(i), &policy(3, 30)).unwrap();
        }

        let items = db.fetch_recent(10).unwrap();
        let texts: Vec<_> = items.iter().map(|i| i.text_content.clone().unwrap()).collect();
        assert_eq!(texts, vec!["item 4", "item 3", "item 2"]);
    }

    #[test]
    fn test_age_sweep_reports_image_files() {
        let db = Database::open_in_memory().unwrap();
        let image = CapturePayload::image(&[9, 9], "/tmp/x.png", "/tmp/x_thumb.png", None);
        db.upsert_item(&image, t0(), &policy(100, 1)).unwrap();

        let evicted = db.sweep(&policy(100, 1), t0() + Duration::days(2)).unwrap();
        assert_eq!(evicted.len(), 1);
        assert!(evicted[0].has_files());
        assert_eq!(evicted[0].image_path.as_deref(), Some("/tmp/x.png"));
        assert_eq!(db.count_items().unwrap(), 0);
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..4 {
            let payload = CapturePayload::text(format!("n{}", i), None);
            db.upsert_item(&payload, t0() + Duration::seconds(i), &policy(5000, 30)).unwrap();
        }
        let now = t0() + Duration::seconds(10);
        assert_eq!(db.sweep(&policy(2, 30), now).unwrap().len(), 2);
        assert!(db.sweep(&policy(2, 30), now).unwrap().is_empty());
        assert_eq!(db.count_items().unwrap(), 2);
    }

    #[test]
    fn test_ties_broken_by_newest_id() {
        let db = Database::open_in_memory().unwrap();
        let a = db.upsert_item(&CapturePayload::text("a", None), t0(), &policy(100, 30)).unwrap();
        let b = db.upsert_item(&CapturePayload::text("b", None), t0(), &policy(100, 30)).unwrap();

        let ids: Vec<i64> = db.fetch_recent(10).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![b.item_id, a.item_id]);
    }

    #[test]
    fn test_search_text_skips_images_and_matches_literally() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_item(&CapturePayload::text("100% done", None), t0(), &policy(100, 30)).unwrap();
        db.upsert_item(&CapturePayload::text("1000 done", None), t0(), &policy(100, 30)).unwrap();
        db.upsert_item(&CapturePayload::image(&[1], "/a.png", "/a_t.png", None), t0(), &policy(100, 30))
            .unwrap();

        let hits = db.search_text("0%", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text_content.as_deref(), Some("100% done"));

        assert!(db.search_text("1_0", 10).unwrap().is_empty());
        assert_eq!(db.search_text("DONE", 10).unwrap().len(), 2);
    }

    #[test]
    fn test_unparseable_timestamp_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.get_conn()
            .unwrap()
            .execute(
                "INSERT INTO clipboard_items (content_type, content_hash, text_content, created_at, updated_at)
                 VALUES ('text', 'h1', 'x', 'yesterday', 'yesterday')",
                [],
            )
            .unwrap();

        assert!(matches!(
            db.get_item(1),
            Err(DatabaseError::Sqlite(rusqlite::Error::FromSqlConversionFailure(8, _, _)))
        ));
        assert!(db.fetch_recent(10).is_err());
    }

    #[test]
    fn test_touch_by_hash_missing_returns_none() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.touch_by_hash("nope", t0()).unwrap(), None);
    }

    #[test]
    fn test_settings_upsert_by_key() {
        let db = Database::open_in_memory().unwrap();
        db.put_setting("max_items", "200").unwrap();
        db.put_setting("max_items", "300").unwrap();
        let pairs = db.load_settings().unwrap();
        assert_eq!(pairs, vec![("max_items".to_string(), "300".to_string())]);
    }

    #[test]
    fn test_latest_update() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.latest_update().unwrap(), None);
        db.upsert_item(&CapturePayload::text("x", None), t0(), &policy(100, 30)).unwrap();
        assert_eq!(db.latest_update().unwrap(), Some(t0()));
    }
}
