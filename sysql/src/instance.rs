///
/// # Connection Instances
///
/// A `DbInstance` is one logical session against an engine handle. It is
/// either primary, holding the exclusive lock on the manager's primary
/// handle for its whole lifetime, or transient, owning a private handle
/// that is closed when the instance goes away. Never both.
///
/// Affected-table operations forward to the session of the underlying
/// handle, so a primary instance reports into the bookkeeping the manager
/// keeps for the primary handle.
///
/// Dropping an instance clears every affected table's per-query state,
/// then releases the primary lock or closes the transient handle.
///

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{RawMutex, ReentrantMutex, ReentrantMutexGuard};
use rusqlite::Connection;

use crate::errors::Result;
use crate::handle::EngineHandle;
use crate::registry::{TableRegistry, VirtualTableContent};

enum InstanceHandle {
    Primary(ArcMutexGuard<RawMutex, EngineHandle>),
    /// Taken only by `Drop`.
    Transient(Option<EngineHandle>),
}

pub struct DbInstance {
    handle: InstanceHandle,
    attach_mutex: Arc<ReentrantMutex<()>>,
}

impl DbInstance {
    pub(crate) fn primary(
        guard: ArcMutexGuard<RawMutex, EngineHandle>,
        attach_mutex: Arc<ReentrantMutex<()>>,
    ) -> Self {
        Self {
            handle: InstanceHandle::Primary(guard),
            attach_mutex,
        }
    }

    pub(crate) fn transient(handle: EngineHandle) -> Self {
        Self {
            handle: InstanceHandle::Transient(Some(handle)),
            attach_mutex: Arc::new(ReentrantMutex::new(())),
        }
    }

    fn engine(&self) -> &EngineHandle {
        match &self.handle {
            InstanceHandle::Primary(guard) => &**guard,
            InstanceHandle::Transient(Some(handle)) => handle,
            InstanceHandle::Transient(None) => unreachable!("transient handle taken before drop"),
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self.handle, InstanceHandle::Primary(_))
    }

    pub fn db(&self) -> &Connection {
        self.engine().conn()
    }

    pub fn generation(&self) -> u64 {
        self.engine().generation()
    }

    pub fn add_affected_table(&self, table: &Arc<VirtualTableContent>) {
        self.engine().session().add_affected_table(table);
    }

    pub fn clear_affected_tables(&self) {
        self.engine().session().clear();
    }

    pub fn table_called(&self, name: &str) -> bool {
        self.engine().session().table_called(name)
    }

    pub fn affected_tables(&self) -> Vec<String> {
        self.engine().session().affected_names()
    }

    pub fn set_use_cache(&self, use_cache: bool) {
        self.engine().session().set_use_cache(use_cache);
    }

    pub fn use_cache(&self) -> bool {
        self.engine().session().use_cache()
    }

    pub fn is_attached(&self, name: &str) -> bool {
        self.engine().is_attached(name)
    }

    /// Scoped guard on the attach mutex: the manager's shared one when
    /// primary, a private one when transient.
    pub fn attach_lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.attach_mutex.lock()
    }

    /// Attach one table to this instance's handle. No-op if already attached.
    pub fn attach_table(&self, table: &Arc<VirtualTableContent>) -> Result<()> {
        let _lock = self.attach_lock();
        self.engine().attach(table)?;
        Ok(())
    }

    pub(crate) fn attach_virtual_tables(
        &self,
        registry: &TableRegistry,
        disabled: &HashSet<String>,
    ) -> Result<()> {
        let _lock = self.attach_lock();
        self.engine().attach_all(registry, disabled)
    }

    pub(crate) fn needs_sync(&self, registry: &TableRegistry) -> bool {
        self.engine().needs_sync(registry)
    }
}

impl Drop for DbInstance {
    fn drop(&mut self) {
        self.clear_affected_tables();
        if let InstanceHandle::Transient(handle) = &mut self.handle {
            if let Some(handle) = handle.take() {
                handle.close();
            }
        }
    }
}
