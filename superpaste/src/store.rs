//! ClipboardStore - deduplicated, recency-ordered clipboard history
//!
//! Concurrency Model:
//! - Database uses r2d2 connection pool (concurrent reads, no mutex blocking)
//! - Writers are serialized by `writer`, so an upsert and its retention sweep
//!   commit as one unit and simultaneous duplicate captures cannot double-insert
//! - Readers only see committed transactions
//! - Every committed mutation is announced on a broadcast channel

use crate::clock::{Clock, SystemClock};
use crate::database::{Database, EvictedItem, UpsertOutcome};
use crate::interface::{
    CapturePayload, ClipboardItem, FsImageFileRemover, ImageFileRemover, StoreEvent,
    SuperPasteResult,
};
use crate::models::{to_db_precision, RetentionPolicy};
use crate::search::SearchFilter;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct ClipboardStore {
    db: Arc<Database>,
    /// Held for the duration of every write. Guards the last issued stamp.
    writer: Mutex<Option<DateTime<Utc>>>,
    retention: RwLock<RetentionPolicy>,
    clock: Arc<dyn Clock>,
    files: Arc<dyn ImageFileRemover>,
    events: broadcast::Sender<StoreEvent>,
}

impl ClipboardStore {
    /// Open a store backed by a database file, using the wall clock and the
    /// filesystem image remover
    pub fn open<P: AsRef<Path>>(path: P, retention: RetentionPolicy) -> SuperPasteResult<Self> {
        let db = Database::open(path)?;
        Self::with_collaborators(
            Arc::new(db),
            retention,
            Arc::new(SystemClock),
            Arc::new(FsImageFileRemover),
        )
    }

    pub fn with_collaborators(
        db: Arc<Database>,
        retention: RetentionPolicy,
        clock: Arc<dyn Clock>,
        files: Arc<dyn ImageFileRemover>,
    ) -> SuperPasteResult<Self> {
        let last_stamp = db.latest_update()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            db,
            writer: Mutex::new(last_stamp),
            retention: RwLock::new(retention),
            clock,
            files,
            events,
        })
    }

    /// Create a store with an in-memory database (for testing)
    pub fn new_in_memory() -> SuperPasteResult<Self> {
        Self::with_collaborators(
            Arc::new(Database::open_in_memory()?),
            RetentionPolicy::default(),
            Arc::new(SystemClock),
            Arc::new(FsImageFileRemover),
        )
    }

    /// Receive a `StoreEvent` for every committed mutation
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn retention(&self) -> RetentionPolicy {
        *self.retention.read()
    }

    /// Replace the retention bounds used by subsequent sweeps
    pub fn set_retention(&self, policy: RetentionPolicy) {
        *self.retention.write() = policy;
    }

    /// Next write stamp. Strictly greater than every stamp issued before, so a
    /// touch within the same clock tick still moves an item to the top.
    fn next_stamp(&self, last: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
        let mut now = to_db_precision(self.clock.now());
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }

    fn notify(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Best-effort release of image files owned by deleted rows
    fn release_files<'a, I>(&self, items: I)
    where
        I: IntoIterator<Item = &'a EvictedItem>,
    {
        for item in items {
            if !item.has_files() {
                continue;
            }
            if let Err(e) = self
                .files
                .delete_image_files(item.image_path.as_deref(), item.thumbnail_path.as_deref())
            {
                tracing::warn!(item_id = item.id, error = %e, "Failed to delete image files");
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Insert a capture, or touch the existing row with the same content hash.
    /// The retention sweep runs in the same transaction.
    pub fn upsert(&self, payload: &CapturePayload) -> SuperPasteResult<UpsertOutcome> {
        let outcome = {
            let mut last = self.writer.lock();
            let now = self.next_stamp(&mut last);
            let policy = self.retention();
            self.db.upsert_item(payload, now, &policy)?
        };

        if !outcome.evicted.is_empty() {
            tracing::debug!(evicted = outcome.evicted.len(), "Retention sweep evicted items");
        }
        self.release_files(&outcome.evicted);

        self.notify(StoreEvent::Upserted {
            item_id: outcome.item_id,
            inserted: outcome.inserted,
            evicted: outcome.evicted.len(),
        });
        Ok(outcome)
    }

    /// Bump `updated_at` of the item with this hash. Returns false if no such item.
    pub fn touch(&self, content_hash: &str) -> SuperPasteResult<bool> {
        let touched = {
            let mut last = self.writer.lock();
            let now = self.next_stamp(&mut last);
            self.db.touch_by_hash(content_hash, now)?
        };

        match touched {
            Some(item_id) => {
                self.notify(StoreEvent::Touched { item_id });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete an item. Image files are released afterwards; a failure there is
    /// logged and does not bring the row back.
    pub fn remove(&self, item: &ClipboardItem) -> SuperPasteResult<bool> {
        let removed = {
            let _guard = self.writer.lock();
            self.db.delete_item(item.id)?
        };
        if !removed {
            return Ok(false);
        }

        self.release_files(&[EvictedItem {
            id: item.id,
            image_path: item.image_path.clone(),
            thumbnail_path: item.thumbnail_path.clone(),
        }]);

        self.notify(StoreEvent::Removed { item_id: item.id });
        Ok(true)
    }

    /// Delete an item by ID, releasing its files
    pub fn remove_by_id(&self, item_id: i64) -> SuperPasteResult<bool> {
        match self.db.get_item(item_id)? {
            Some(item) => self.remove(&item),
            None => Ok(false),
        }
    }

    /// Run the retention sweep with the current policy. Returns the number of evicted items.
    /// The age cutoff is taken from the stamp sequence, as in `upsert`.
    pub fn sweep(&self) -> SuperPasteResult<usize> {
        let evicted = {
            let mut last = self.writer.lock();
            let now = self.next_stamp(&mut last);
            let policy = self.retention();
            self.db.sweep(&policy, now)?
        };

        if evicted.is_empty() {
            return Ok(0);
        }
        tracing::debug!(evicted = evicted.len(), "Retention sweep evicted items");
        self.release_files(&evicted);
        self.notify(StoreEvent::Swept {
            evicted: evicted.len(),
        });
        Ok(evicted.len())
    }

    /// Delete all items and their files
    pub fn clear(&self) -> SuperPasteResult<()> {
        let removed = {
            let _guard = self.writer.lock();
            self.db.clear_all()?
        };
        self.release_files(&removed);
        self.notify(StoreEvent::Cleared);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Items by recency, newest first
    pub fn list(&self, limit: usize) -> SuperPasteResult<Vec<ClipboardItem>> {
        Ok(self.db.fetch_recent(limit)?)
    }

    /// Blank query lists everything; otherwise items whose text contains the query
    pub fn search(&self, query: &str, limit: usize) -> SuperPasteResult<Vec<ClipboardItem>> {
        match SearchFilter::parse(query) {
            SearchFilter::All => self.list(limit),
            SearchFilter::Substring(needle) => Ok(self.db.search_text(needle, limit)?),
        }
    }

    pub fn get(&self, item_id: i64) -> SuperPasteResult<Option<ClipboardItem>> {
        Ok(self.db.get_item(item_id)?)
    }

    pub fn find_by_hash(&self, content_hash: &str) -> SuperPasteResult<Option<ClipboardItem>> {
        Ok(self.db.find_by_hash(content_hash)?)
    }

    pub fn count(&self) -> SuperPasteResult<u64> {
        Ok(self.db.count_items()?)
    }
}
