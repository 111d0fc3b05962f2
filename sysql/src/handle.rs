///
/// Engine handles.
///
/// An `EngineHandle` is one open SQLite connection together with the
/// session its virtual tables report into and the set of tables already
/// attached to it. Handles are created only by the connection manager:
/// either as the long-lived primary or as a transient handle owned by a
/// single connection instance.
///

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::config::ManagerConfig;
use crate::errors::{Result, SqlError};
use crate::registry::{TableRegistry, VirtualTableContent};
use crate::session::QuerySession;
use crate::vtab;

pub struct EngineHandle {
    conn: Connection,
    session: Arc<QuerySession>,
    attached: Mutex<IndexSet<String>>,
    attached_generation: AtomicU64,
    generation: u64,
}

impl EngineHandle {
    /// Open an optimized in-memory handle with every function extension registered.
    pub(crate) fn open(config: &ManagerConfig, generation: u64) -> Result<Self> {
        let conn =
            sysql_std_sqlite3::open_optimized(config.soft_heap_limit).map_err(SqlError::open)?;
        sysql_std_functions::register_all(&conn).map_err(SqlError::open)?;
        debug!(generation, "opened engine handle");

        Ok(Self {
            conn,
            session: Arc::new(QuerySession::new()),
            attached: Mutex::new(IndexSet::new()),
            attached_generation: AtomicU64::new(0),
            generation,
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn session(&self) -> &Arc<QuerySession> {
        &self.session
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_attached(&self, name: &str) -> bool {
        self.attached.lock().contains(name)
    }

    pub fn attached_tables(&self) -> Vec<String> {
        self.attached.lock().iter().cloned().collect()
    }

    /// Attach one table. Returns false if it was already attached.
    pub(crate) fn attach(&self, content: &Arc<VirtualTableContent>) -> Result<bool> {
        let mut attached = self.attached.lock();
        if attached.contains(content.name()) {
            return Ok(false);
        }
        vtab::attach_table(&self.conn, content, &self.session).map_err(|e| SqlError::Table {
            name: content.name().to_string(),
            reason: e.to_string(),
        })?;
        attached.insert(content.name().to_string());
        Ok(true)
    }

    /// True when tables were registered since the last `attach_all`.
    pub(crate) fn needs_sync(&self, registry: &TableRegistry) -> bool {
        self.attached_generation.load(Ordering::Acquire) != registry.generation()
    }

    /// Attach every registered table not named in `disabled`.
    pub(crate) fn attach_all(
        &self,
        registry: &TableRegistry,
        disabled: &HashSet<String>,
    ) -> Result<()> {
        let generation = registry.generation();
        for table in registry.tables() {
            if disabled.contains(table.name()) {
                continue;
            }
            self.attach(&table)?;
        }
        self.attached_generation.store(generation, Ordering::Release);
        Ok(())
    }

    pub(crate) fn close(self) {
        let generation = self.generation;
        if let Err((_conn, e)) = self.conn.close() {
            warn!(generation, error = %e, "failed to close engine handle");
        }
    }
}
