///
/// Per-handle query bookkeeping.
///
/// Every engine handle owns one `QuerySession`. The table module reports
/// each table SQLite plans or scans into the session of the handle it is
/// attached to; the connection instance using that handle clears the
/// session once its query is finished. Tables are referenced weakly and by
/// name, so a session never keeps a table alive.
///

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::registry::VirtualTableContent;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct QuerySession {
    id: u64,
    affected: Mutex<BTreeMap<String, Weak<VirtualTableContent>>>,
    use_cache: AtomicBool,
}

impl Default for QuerySession {
    fn default() -> Self {
        Self::new()
    }
}

impl QuerySession {
    pub fn new() -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            affected: Mutex::new(BTreeMap::new()),
            use_cache: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn add_affected_table(&self, table: &Arc<VirtualTableContent>) {
        self.affected
            .lock()
            .entry(table.name().to_string())
            .or_insert_with(|| Arc::downgrade(table));
    }

    pub fn table_called(&self, name: &str) -> bool {
        self.affected.lock().contains_key(name)
    }

    pub fn affected_names(&self) -> Vec<String> {
        self.affected.lock().keys().cloned().collect()
    }

    /// Discard this session's per-query state in every recorded table and
    /// reset the cache flag.
    pub fn clear(&self) {
        let affected = std::mem::take(&mut *self.affected.lock());
        for table in affected.values().filter_map(Weak::upgrade) {
            table.clear_query_state(self.id);
        }
        self.use_cache.store(false, Ordering::Release);
    }

    pub fn set_use_cache(&self, use_cache: bool) {
        self.use_cache.store(use_cache, Ordering::Release);
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache.load(Ordering::Acquire)
    }
}
