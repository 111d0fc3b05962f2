///
/// # Connection Manager
///
/// The `DbManager` arbitrates access to one long-lived primary engine
/// handle. `get()` never blocks on a busy primary: a caller that finds it
/// locked receives a transient instance with its own handle instead.
///
/// ## Locking
///
/// - `primary`: the creation mutex. Guards the slot holding the primary
///   handle and is held while the handle is created, reset or try-locked.
/// - each primary handle sits in an `Arc<Mutex<_>>`; a primary instance owns
///   an `ArcMutexGuard` on it, so the handle stays valid until the instance
///   drops even if the slot has moved on.
/// - `attach_mutex`: reentrant, shared by every primary instance, taken
///   whenever tables are attached to the primary.
///
/// ## Reset
///
/// `reset_primary()` closes an idle primary immediately. A primary that is
/// in use is left alone and marked; the first `get()` that finds it idle
/// discards it and builds a new one. "In use" covers a guard that has
/// already unlocked but not yet released its reference, so a reset always
/// closes the handle through `EngineHandle::close`.
///

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::errors::{Result, SqlError};
use crate::handle::EngineHandle;
use crate::instance::DbInstance;
use crate::registry::TableRegistry;

static MANAGER: OnceLock<DbManager> = OnceLock::new();

#[derive(Default)]
struct PrimarySlot {
    handle: Option<Arc<Mutex<EngineHandle>>>,
    reset_pending: bool,
}

pub struct DbManager {
    config: ManagerConfig,
    registry: Arc<TableRegistry>,
    disabled_tables: HashSet<String>,
    primary: Mutex<PrimarySlot>,
    attach_mutex: Arc<ReentrantMutex<()>>,
    next_generation: AtomicU64,
}

impl DbManager {
    pub fn new(config: ManagerConfig, registry: Arc<TableRegistry>) -> Self {
        let disabled_tables = config.disabled_set();
        Self {
            config,
            registry,
            disabled_tables,
            primary: Mutex::new(PrimarySlot::default()),
            attach_mutex: Arc::new(ReentrantMutex::new(())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Install the process-wide manager. Fails if one is already installed.
    pub fn install(manager: DbManager) -> Result<&'static DbManager> {
        let mut installed = false;
        let global = MANAGER.get_or_init(|| {
            installed = true;
            manager
        });
        if installed {
            Ok(global)
        } else {
            Err(SqlError::AlreadyInstalled)
        }
    }

    /// The process-wide manager, defaulting to an empty registry.
    pub fn global() -> &'static DbManager {
        MANAGER.get_or_init(|| {
            DbManager::new(ManagerConfig::default(), Arc::new(TableRegistry::new()))
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TableRegistry> {
        &self.registry
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled_tables.contains(name)
    }

    /// The primary instance if the primary handle is free, otherwise a
    /// transient one.
    pub fn get(&self) -> Result<DbInstance> {
        let acquired = {
            let mut slot = self.primary.lock();
            if slot.reset_pending {
                match slot.handle.take() {
                    Some(handle) if in_use(&handle) => slot.handle = Some(handle),
                    Some(handle) => {
                        slot.reset_pending = false;
                        info!("recreating primary after deferred reset");
                        close_primary(handle);
                    }
                    None => slot.reset_pending = false,
                }
            }

            let handle = match slot.handle.clone() {
                Some(handle) => handle,
                None => {
                    let handle = Arc::new(Mutex::new(self.open_primary()?));
                    slot.handle = Some(Arc::clone(&handle));
                    handle
                }
            };
            handle.try_lock_arc()
        };

        match acquired {
            Some(guard) => {
                let instance = DbInstance::primary(guard, Arc::clone(&self.attach_mutex));
                if instance.needs_sync(&self.registry) {
                    instance.attach_virtual_tables(&self.registry, &self.disabled_tables)?;
                }
                Ok(instance)
            }
            None => {
                debug!("primary connection busy, using a transient connection");
                self.get_unique()
            }
        }
    }

    /// Always a transient instance with a private handle.
    pub fn get_unique(&self) -> Result<DbInstance> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let instance = DbInstance::transient(EngineHandle::open(&self.config, generation)?);
        instance.attach_virtual_tables(&self.registry, &self.disabled_tables)?;
        debug!(generation, "opened transient connection");
        Ok(instance)
    }

    /// Close the primary handle so the next `get()` builds a new one.
    pub fn reset_primary(&self) {
        let mut slot = self.primary.lock();
        match slot.handle.take() {
            None => slot.reset_pending = false,
            Some(handle) if in_use(&handle) => {
                slot.handle = Some(handle);
                slot.reset_pending = true;
                info!("primary connection in use, reset deferred");
            }
            Some(handle) => {
                slot.reset_pending = false;
                close_primary(handle);
                info!("primary connection reset");
            }
        }
    }

    fn open_primary(&self) -> Result<EngineHandle> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let handle = EngineHandle::open(&self.config, generation)?;
        {
            let _lock = self.attach_mutex.lock();
            handle.attach_all(&self.registry, &self.disabled_tables)?;
        }
        info!(
            generation,
            tables = handle.attached_tables().len(),
            "opened primary connection"
        );
        Ok(handle)
    }
}

/// Locked, or still referenced by a guard that is releasing it.
fn in_use(handle: &Arc<Mutex<EngineHandle>>) -> bool {
    handle.is_locked() || Arc::strong_count(handle) > 1
}

fn close_primary(handle: Arc<Mutex<EngineHandle>>) {
    match Arc::try_unwrap(handle) {
        Ok(mutex) => mutex.into_inner().close(),
        Err(handle) => warn!(
            references = Arc::strong_count(&handle),
            "primary connection still referenced, closing on last release"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_tables::simple_table;

    fn manager(disabled: &str) -> DbManager {
        let registry = Arc::new(TableRegistry::new());
        registry.register(simple_table("alpha", 2)).unwrap();
        DbManager::new(
            ManagerConfig::default().with_disabled_tables(disabled),
            registry,
        )
    }

    #[test]
    fn test_get_is_primary_when_idle() {
        let manager = manager("");
        let first = manager.get().unwrap();
        assert!(first.is_primary());
        let generation = first.generation();
        drop(first);

        let again = manager.get().unwrap();
        assert!(again.is_primary());
        assert_eq!(again.generation(), generation);
    }

    #[test]
    fn test_busy_primary_yields_transient() {
        let manager = manager("");
        let primary = manager.get().unwrap();
        let other = manager.get().unwrap();
        assert!(primary.is_primary());
        assert!(!other.is_primary());
        assert_ne!(primary.generation(), other.generation());

        let n: i64 = other
            .db()
            .query_row("SELECT count(*) FROM alpha", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn test_get_unique_is_transient() {
        let manager = manager("");
        let unique = manager.get_unique().unwrap();
        assert!(!unique.is_primary());
        assert!(unique.is_attached("alpha"));
    }

    #[test]
    fn test_is_disabled() {
        let manager = manager(" beta , alpha,,");
        assert!(manager.is_disabled("alpha"));
        assert!(manager.is_disabled("beta"));
        assert!(!manager.is_disabled("gamma"));

        let instance = manager.get().unwrap();
        assert!(!instance.is_attached("alpha"));
        assert!(instance.db().prepare("SELECT * FROM alpha").is_err());
    }

    #[test]
    fn test_reset_idle_primary() {
        let manager = manager("");
        let old = manager.get().unwrap().generation();
        manager.reset_primary();

        let fresh = manager.get().unwrap();
        assert!(fresh.is_primary());
        assert_ne!(fresh.generation(), old);
        assert!(fresh.is_attached("alpha"));
    }

    #[test]
    fn test_reset_waits_for_released_reference() {
        let manager = manager("");
        let old = manager.get().unwrap().generation();

        // An unlocked handle whose last guard has not dropped its reference.
        let lingering = manager.primary.lock().handle.clone().unwrap();
        assert!(!lingering.is_locked());

        manager.reset_primary();
        assert!(manager.primary.lock().reset_pending);
        assert!(manager.primary.lock().handle.is_some());

        drop(lingering);
        let fresh = manager.get().unwrap();
        assert!(fresh.is_primary());
        assert_ne!(fresh.generation(), old);
        assert!(!manager.primary.lock().reset_pending);
    }

    #[test]
    fn test_reset_without_primary_is_noop() {
        let manager = manager("");
        manager.reset_primary();
        assert!(manager.get().unwrap().is_primary());
    }
}
