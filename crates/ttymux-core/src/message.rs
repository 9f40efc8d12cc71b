//! Bus message types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BROADCAST_UNIT, Unit};

/// Opaque identifier of the execution context that sent a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    /// Generate a fresh origin for a starting context.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a message announces or carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A unit became bound to a context.
    Register,
    /// A unit was released.
    Unregister,
    /// Device output for a unit (primary only).
    Output,
    /// Keystrokes typed on a unit's surface.
    Input,
    /// Roster probe; every context answers with a pong.
    Ping,
    /// "I saw you" acknowledgement carrying a live unit.
    Pong,
}

/// The unit of communication on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    /// Target unit, or `BROADCAST_UNIT`.
    pub unit: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub origin: Origin,
    /// Sender-local milliseconds, diagnostics only.
    pub timestamp: u64,
}

impl Message {
    /// The addressed unit, if the message targets a single valid one.
    #[must_use]
    pub fn target(&self) -> Option<Unit> {
        if self.unit == BROADCAST_UNIT {
            return None;
        }
        Unit::try_from(self.unit).ok()
    }

    /// Whether the message is addressed to every unit.
    #[must_use]
    pub const fn is_broadcast(&self) -> bool {
        self.unit == BROADCAST_UNIT
    }

    /// Payload text, empty when omitted.
    #[must_use]
    pub fn payload_str(&self) -> &str {
        self.payload.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(kind: MessageKind, unit: i32) -> Message {
        Message {
            kind,
            unit,
            payload: None,
            origin: Origin::from_raw("ctx-a"),
            timestamp: 0,
        }
    }

    #[test]
    fn test_target() {
        assert_eq!(msg(MessageKind::Output, 2).target(), Unit::new(2).ok());
        assert_eq!(msg(MessageKind::Ping, BROADCAST_UNIT).target(), None);
        assert!(msg(MessageKind::Ping, BROADCAST_UNIT).is_broadcast());
        assert_eq!(msg(MessageKind::Input, 42).target(), None);
    }

    #[test]
    fn test_origins_are_unique() {
        assert_ne!(Origin::generate(), Origin::generate());
    }

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&MessageKind::Unregister).unwrap();
        assert_eq!(json, "\"unregister\"");
    }
}
