//! Allocating units and supervising the contexts bound to them.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use ttymux_core::{BindingParams, ContextHandle, ContextLauncher, LaunchError, Unit};

use crate::{
    liveness::{LivenessWatch, WatchGuard},
    registry::SessionRegistry,
};

/// Spawn error.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("All units are in use")]
    CapacityExhausted,
    #[error("Unit {0} is already in use")]
    UnitInUse(Unit),
    #[error("Unit {0} is reserved for the primary")]
    ReservedUnit(Unit),
    #[error("Unit {0} is not owned by this context")]
    NotOwned(Unit),
    #[error("Failed to launch context for unit {unit}: {source}")]
    Launch {
        unit: Unit,
        #[source]
        source: LaunchError,
    },
}

/// A context this spawner created and still supervises.
struct Owned {
    lease: u64,
    handle: Arc<dyn ContextHandle>,
    guard: WatchGuard,
}

struct Shared {
    registry: Arc<SessionRegistry>,
    launcher: Arc<dyn ContextLauncher>,
    watch: Arc<dyn LivenessWatch>,
    owned: Mutex<HashMap<Unit, Owned>>,
    next_lease: AtomicU64,
}

impl Shared {
    /// Reserve `unit`, or the next free unit, and retire any handle still
    /// held for it.
    ///
    /// A secondary that exits gracefully frees its unit by gossip before
    /// the liveness poll notices, so the unit can come back free while its
    /// old entry and watcher are still here. The entry is removed under the
    /// same lock as the reservation so that watcher cannot release it later.
    fn reserve(&self, unit: Option<Unit>) -> Result<(Unit, Option<Owned>), SpawnError> {
        let mut owned = self.owned.lock().unwrap_or_else(PoisonError::into_inner);
        let unit = match unit {
            Some(unit) if unit.is_primary() => return Err(SpawnError::ReservedUnit(unit)),
            Some(unit) => {
                if !self.registry.reserve(unit) {
                    return Err(SpawnError::UnitInUse(unit));
                }
                unit
            }
            None => self
                .registry
                .reserve_next_free()
                .ok_or(SpawnError::CapacityExhausted)?,
        };
        Ok((unit, owned.remove(&unit)))
    }

    /// Free `unit` if `lease` is still its current incarnation.
    fn release(&self, unit: Unit, lease: u64, reason: &str) {
        let mut owned = self.owned.lock().unwrap_or_else(PoisonError::into_inner);
        if !owned.get(&unit).is_some_and(|entry| entry.lease == lease) {
            return;
        }
        let removed = owned.remove(&unit);
        tracing::info!(unit = %unit, reason, "Session ended");
        self.registry.unregister(unit);
        drop(owned);
        drop(removed);
    }
}

/// Creates sessions on free units and frees them again when their
/// contexts close or vanish.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Spawner {
    shared: Arc<Shared>,
}

impl Spawner {
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        launcher: Arc<dyn ContextLauncher>,
        watch: Arc<dyn LivenessWatch>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                launcher,
                watch,
                owned: Mutex::new(HashMap::new()),
                next_lease: AtomicU64::new(1),
            }),
        }
    }

    /// Lowest free secondary unit in the local view.
    #[must_use]
    pub fn next_free_unit(&self) -> Option<Unit> {
        self.shared.registry.first_free()
    }

    /// Spawn a context on `unit`, or on the next free unit.
    ///
    /// The unit is reserved before the launcher is asked, so a concurrent
    /// spawn in this context cannot pick it. A failed launch rolls the
    /// reservation back.
    ///
    /// # Errors
    /// Returns error if no unit is free, the requested unit is taken or
    /// reserved, or the launcher fails.
    pub async fn spawn(&self, unit: Option<Unit>) -> Result<Unit, SpawnError> {
        let shared = &self.shared;
        let (unit, stale) = shared.reserve(unit)?;
        if let Some(stale) = stale {
            tracing::debug!(unit = %unit, "Retiring handle of an exited session");
            stale.handle.terminate();
        }

        tracing::debug!(unit = %unit, "Reserved unit, launching context");
        let handle = match shared.launcher.launch(BindingParams::new(unit)).await {
            Ok(handle) => handle,
            Err(source) => {
                shared.registry.release(unit);
                tracing::warn!(unit = %unit, error = %source, "Launch failed, reservation rolled back");
                return Err(SpawnError::Launch { unit, source });
            }
        };

        let lease = shared.next_lease.fetch_add(1, Ordering::Relaxed);
        {
            let mut owned = shared.owned.lock().unwrap_or_else(PoisonError::into_inner);
            owned.insert(
                unit,
                Owned {
                    lease,
                    handle: Arc::clone(&handle),
                    guard: WatchGuard::detached(),
                },
            );
        }

        // Installed after the entry exists so an immediate exit still
        // finds something to release.
        let weak: Weak<Shared> = Arc::downgrade(shared);
        let guard = shared.watch.watch(
            handle,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.release(unit, lease, "liveness");
                }
            }),
        );
        {
            let mut owned = shared.owned.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = owned.get_mut(&unit).filter(|e| e.lease == lease) {
                entry.guard = guard;
            }
        }

        tracing::info!(unit = %unit, label = %shared.registry.label(unit), "Spawned session");
        Ok(unit)
    }

    /// Terminate a session this context owns and free its unit.
    ///
    /// # Errors
    /// Returns error if this context holds no handle for `unit`.
    pub fn close(&self, unit: Unit) -> Result<(), SpawnError> {
        let mut owned = self.shared.owned.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = owned.remove(&unit).ok_or(SpawnError::NotOwned(unit))?;

        entry.handle.terminate();
        tracing::info!(unit = %unit, reason = "closed", "Session ended");
        self.shared.registry.unregister(unit);
        drop(owned);
        drop(entry);
        Ok(())
    }

    /// Close every owned session.
    pub fn close_all(&self) {
        for unit in self.owned_units() {
            let _ = self.close(unit);
        }
    }

    /// Units whose contexts this spawner created and still supervises.
    #[must_use]
    pub fn owned_units(&self) -> Vec<Unit> {
        let owned = self.shared.owned.lock().unwrap_or_else(PoisonError::into_inner);
        let mut units: Vec<Unit> = owned.keys().copied().collect();
        units.sort_unstable();
        units
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.shared.registry
    }
}
