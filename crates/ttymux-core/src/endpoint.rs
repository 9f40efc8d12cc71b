//! A context's attachment to the bus.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use futures::{StreamExt, future};

use crate::{Bus, Message, MessageKind, MessageStream, Origin, Role, Unit};

/// One execution context's view of the bus.
///
/// Stamps outgoing messages with the context's origin and a non-decreasing
/// timestamp, refuses `output` from secondaries, and filters the context's
/// own messages out of its subscriptions.
pub struct Endpoint {
    bus: Arc<dyn Bus>,
    origin: Origin,
    role: Role,
    clock: AtomicU64,
}

impl Endpoint {
    /// Attach a new context with a freshly generated origin.
    #[must_use]
    pub fn new(bus: Arc<dyn Bus>, role: Role) -> Self {
        Self::with_origin(bus, role, Origin::generate())
    }

    /// Attach with a caller-chosen origin.
    #[must_use]
    pub fn with_origin(bus: Arc<dyn Bus>, role: Role, origin: Origin) -> Self {
        Self {
            bus,
            origin,
            role,
            clock: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Whether a received message came from this context.
    #[must_use]
    pub fn is_own(&self, msg: &Message) -> bool {
        msg.origin == self.origin
    }

    /// Publish a message with a raw wire unit.
    ///
    /// Returns `false` if the message was dropped by the role guard.
    pub fn publish(&self, kind: MessageKind, unit: i32, payload: Option<String>) -> bool {
        if kind == MessageKind::Output && self.role != Role::Primary {
            tracing::warn!(
                origin = %self.origin,
                unit,
                "Secondary context attempted to publish output, dropping"
            );
            return false;
        }

        let msg = Message {
            kind,
            unit,
            payload,
            origin: self.origin.clone(),
            timestamp: self.tick(),
        };
        tracing::trace!(kind = ?msg.kind, unit, "Publishing");
        self.bus.publish(msg);
        true
    }

    /// Publish a message addressed to a single unit.
    pub fn send(&self, kind: MessageKind, unit: Unit, payload: Option<String>) -> bool {
        self.publish(kind, unit.into(), payload)
    }

    /// Subscribe to every message not sent by this context.
    #[must_use]
    pub fn subscribe(&self) -> MessageStream {
        let origin = self.origin.clone();
        self.bus
            .subscribe()
            .filter(move |msg| future::ready(msg.origin != origin))
            .boxed()
    }

    fn tick(&self) -> u64 {
        let now = now_millis();
        self.clock.fetch_max(now, Ordering::AcqRel).max(now)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::LocalBus;

    fn bus() -> Arc<dyn Bus> {
        Arc::new(LocalBus::default())
    }

    #[tokio::test]
    async fn test_own_messages_are_filtered() {
        let bus = bus();
        let a = Endpoint::new(Arc::clone(&bus), Role::Primary);
        let b = Endpoint::new(Arc::clone(&bus), Role::Secondary);
        let mut a_rx = a.subscribe();

        a.publish(MessageKind::Ping, crate::BROADCAST_UNIT, None);
        b.publish(MessageKind::Pong, 3, None);

        let got = a_rx.next().await.unwrap();
        assert_eq!(got.kind, MessageKind::Pong);
        assert_eq!(&got.origin, b.origin());
    }

    #[tokio::test]
    async fn test_secondary_cannot_publish_output() {
        let bus = bus();
        let mut raw = bus.subscribe();
        let secondary = Endpoint::new(Arc::clone(&bus), Role::Secondary);

        assert!(!secondary.send(MessageKind::Output, Unit::new(2).unwrap(), Some("A".into())));
        assert!(secondary.send(MessageKind::Input, Unit::new(2).unwrap(), Some("a".into())));

        assert_eq!(raw.next().await.unwrap().kind, MessageKind::Input);
    }

    #[tokio::test]
    async fn test_timestamps_never_decrease() {
        let bus = bus();
        let mut raw = bus.subscribe();
        let ep = Endpoint::new(Arc::clone(&bus), Role::Primary);

        ep.publish(MessageKind::Ping, -1, None);
        tokio::time::sleep(Duration::from_millis(2)).await;
        ep.publish(MessageKind::Ping, -1, None);

        let first = raw.next().await.unwrap().timestamp;
        let second = raw.next().await.unwrap().timestamp;
        assert!(first > 0);
        assert!(second >= first);
    }
}
