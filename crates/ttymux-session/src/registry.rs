//! Per-context view of which units are bound.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use ttymux_core::{Endpoint, MAX_UNITS, Message, MessageKind, Unit};

/// The registry's record of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub unit: Unit,
    pub label: String,
    pub in_use: bool,
    pub is_primary: bool,
}

/// Local, advisory view of the unit roster.
///
/// Rebuilt by gossip: the context applies its own changes immediately and
/// peers' changes as their `register`/`unregister`/`pong` messages arrive.
/// Every update is an idempotent set-membership toggle, so reordering and
/// duplicates are harmless. Unit 0 is in use for the registry's lifetime.
pub struct SessionRegistry {
    endpoint: Arc<Endpoint>,
    label_prefix: String,
    in_use: RwLock<[bool; MAX_UNITS]>,
}

impl SessionRegistry {
    /// Create a registry where only the primary's unit is in use.
    #[must_use]
    pub fn new(endpoint: Arc<Endpoint>, label_prefix: impl Into<String>) -> Self {
        let mut in_use = [false; MAX_UNITS];
        in_use[Unit::PRIMARY.index()] = true;
        Self {
            endpoint,
            label_prefix: label_prefix.into(),
            in_use: RwLock::new(in_use),
        }
    }

    /// Mark `unit` in use and announce it.
    ///
    /// Registering a unit already in use changes nothing and publishes
    /// nothing.
    pub fn register(&self, unit: Unit) {
        if self.set(unit, true) {
            tracing::info!(unit = %unit, "Registered");
            self.endpoint.send(MessageKind::Register, unit, None);
        }
    }

    /// Mark `unit` free and announce it.
    ///
    /// Unregistering a free unit (or the primary's) changes nothing and
    /// publishes nothing.
    pub fn unregister(&self, unit: Unit) {
        if unit.is_primary() {
            tracing::warn!("Refusing to unregister the primary unit");
            return;
        }
        if self.set(unit, false) {
            tracing::info!(unit = %unit, "Unregistered");
            self.endpoint.send(MessageKind::Unregister, unit, None);
        }
    }

    /// Reserve a specific unit locally without announcing it.
    ///
    /// Returns `false` if the unit is already in use.
    #[must_use]
    pub fn reserve(&self, unit: Unit) -> bool {
        let mut in_use = self.in_use.write().unwrap_or_else(PoisonError::into_inner);
        if in_use[unit.index()] {
            return false;
        }
        in_use[unit.index()] = true;
        true
    }

    /// Reserve the lowest free secondary unit locally.
    ///
    /// The scan and the reservation happen under one lock, so concurrent
    /// callers never get the same unit.
    #[must_use]
    pub fn reserve_next_free(&self) -> Option<Unit> {
        let mut in_use = self.in_use.write().unwrap_or_else(PoisonError::into_inner);
        let unit = Unit::secondaries().find(|u| !in_use[u.index()])?;
        in_use[unit.index()] = true;
        Some(unit)
    }

    /// Undo a local reservation without announcing anything.
    pub fn release(&self, unit: Unit) {
        if !unit.is_primary() {
            self.set(unit, false);
        }
    }

    /// Lowest free secondary unit, without reserving it.
    #[must_use]
    pub fn first_free(&self) -> Option<Unit> {
        let in_use = self.in_use.read().unwrap_or_else(PoisonError::into_inner);
        Unit::secondaries().find(|u| !in_use[u.index()])
    }

    /// Apply a peer's roster message.
    ///
    /// Returns whether the local view changed. Messages from this context,
    /// roster changes for unit 0 and non-roster kinds are ignored.
    pub fn on_peer_message(&self, msg: &Message) -> bool {
        if self.endpoint.is_own(msg) {
            return false;
        }
        let in_use = match msg.kind {
            MessageKind::Register | MessageKind::Pong => true,
            MessageKind::Unregister => false,
            _ => return false,
        };
        let Some(unit) = msg.target() else {
            tracing::debug!(unit = msg.unit, kind = ?msg.kind, "Ignoring roster message without a valid unit");
            return false;
        };
        if unit.is_primary() {
            if msg.kind != MessageKind::Pong {
                tracing::warn!(
                    origin = %msg.origin,
                    kind = ?msg.kind,
                    "Peer claims the primary unit, ignoring"
                );
            }
            return false;
        }

        let changed = self.set(unit, in_use);
        if changed {
            tracing::debug!(unit = %unit, in_use, origin = %msg.origin, "Peer roster update");
        }
        changed
    }

    /// Whether `unit` is in use in this view.
    #[must_use]
    pub fn is_in_use(&self, unit: Unit) -> bool {
        self.in_use.read().unwrap_or_else(PoisonError::into_inner)[unit.index()]
    }

    /// Units in use, ascending.
    #[must_use]
    pub fn active_units(&self) -> Vec<Unit> {
        let in_use = self.in_use.read().unwrap_or_else(PoisonError::into_inner);
        Unit::all().filter(|u| in_use[u.index()]).collect()
    }

    /// Full snapshot of every slot.
    #[must_use]
    pub fn sessions(&self) -> Vec<Session> {
        let in_use = self.in_use.read().unwrap_or_else(PoisonError::into_inner);
        Unit::all()
            .map(|unit| Session {
                unit,
                label: unit.label(&self.label_prefix),
                in_use: in_use[unit.index()],
                is_primary: unit.is_primary(),
            })
            .collect()
    }

    /// Label of one unit.
    #[must_use]
    pub fn label(&self, unit: Unit) -> String {
        unit.label(&self.label_prefix)
    }

    fn set(&self, unit: Unit, value: bool) -> bool {
        let mut in_use = self.in_use.write().unwrap_or_else(PoisonError::into_inner);
        let changed = in_use[unit.index()] != value;
        in_use[unit.index()] = value;
        changed
    }
}
