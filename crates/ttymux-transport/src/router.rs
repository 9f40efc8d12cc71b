//! Primary-side bridge between the device and the bus.

use std::sync::Arc;

use ttymux_core::{Device, Endpoint, Message, MessageKind, Role, Surface, Unit};
use ttymux_session::SessionRegistry;

use crate::protocol::{bytes_to_payload, payload_to_bytes};

/// Routes device output to sessions and session input to the device.
///
/// Output for unit 0 is painted on the local surface; output for any other
/// unit is published on the bus. Input from peers is injected into the
/// device character by character, in payload order.
pub struct IoRouter {
    endpoint: Arc<Endpoint>,
    registry: Arc<SessionRegistry>,
    device: Arc<dyn Device>,
    surface: Arc<dyn Surface>,
}

impl IoRouter {
    #[must_use]
    pub fn new(
        endpoint: Arc<Endpoint>,
        registry: Arc<SessionRegistry>,
        device: Arc<dyn Device>,
        surface: Arc<dyn Surface>,
    ) -> Self {
        debug_assert_eq!(endpoint.role(), Role::Primary);
        Self {
            endpoint,
            registry,
            device,
            surface,
        }
    }

    /// Device output callback.
    pub fn on_output(&self, unit: Unit, byte: u8) {
        self.on_output_chunk(unit, &[byte]);
    }

    /// Device output callback for a run of bytes on one unit.
    pub fn on_output_chunk(&self, unit: Unit, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let text = bytes_to_payload(bytes);
        if unit.is_primary() {
            self.surface.render(&text);
        } else {
            self.endpoint.send(MessageKind::Output, unit, Some(text));
        }
    }

    /// Keystrokes typed on the primary's own surface.
    pub fn type_local(&self, text: &str) {
        self.inject(Unit::PRIMARY, text);
    }

    /// Handle one message from a peer.
    pub fn handle_message(&self, msg: &Message) {
        if self.endpoint.is_own(msg) {
            return;
        }
        match msg.kind {
            MessageKind::Input => self.on_input(msg),
            MessageKind::Register => {
                self.registry.on_peer_message(msg);
                if let Some(unit) = msg.target().filter(|u| !u.is_primary()) {
                    self.endpoint.send(MessageKind::Pong, unit, None);
                }
            }
            MessageKind::Unregister | MessageKind::Pong => {
                self.registry.on_peer_message(msg);
            }
            MessageKind::Ping => {
                self.endpoint.send(MessageKind::Pong, Unit::PRIMARY, None);
            }
            MessageKind::Output => {
                tracing::warn!(
                    origin = %msg.origin,
                    unit = msg.unit,
                    "Peer published device output, dropping"
                );
            }
        }
    }

    fn on_input(&self, msg: &Message) {
        let Some(unit) = msg.target() else {
            tracing::warn!(unit = msg.unit, origin = %msg.origin, "Input for invalid unit, dropping");
            return;
        };
        if unit.is_primary() {
            tracing::warn!(origin = %msg.origin, "Peer sent input for the primary unit, dropping");
            return;
        }
        if !self.registry.is_in_use(unit) {
            tracing::debug!(unit = %unit, "Input for a unit not yet in the local roster");
        }
        self.inject(unit, msg.payload_str());
    }

    fn inject(&self, unit: Unit, text: &str) {
        for byte in payload_to_bytes(text) {
            self.device.inject_input(unit, byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::StreamExt;
    use ttymux_core::{Bus, LocalBus, Origin};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        input: Mutex<Vec<(Unit, u8)>>,
        rendered: Mutex<String>,
    }

    impl Device for Recorder {
        fn inject_input(&self, unit: Unit, byte: u8) {
            self.input.lock().unwrap().push((unit, byte));
        }
    }

    impl Surface for Recorder {
        fn render(&self, text: &str) {
            self.rendered.lock().unwrap().push_str(text);
        }
    }

    fn unit(n: i64) -> Unit {
        Unit::new(n).unwrap()
    }

    fn setup() -> (Arc<dyn Bus>, IoRouter, Arc<Recorder>) {
        let bus: Arc<dyn Bus> = Arc::new(LocalBus::default());
        let endpoint = Arc::new(Endpoint::new(Arc::clone(&bus), Role::Primary));
        let registry = Arc::new(SessionRegistry::new(Arc::clone(&endpoint), "TTY"));
        let recorder = Arc::new(Recorder::default());
        let router = IoRouter::new(
            endpoint,
            registry,
            Arc::clone(&recorder) as Arc<dyn Device>,
            Arc::clone(&recorder) as Arc<dyn Surface>,
        );
        (bus, router, recorder)
    }

    fn peer(kind: MessageKind, unit: i32, payload: Option<&str>) -> Message {
        Message {
            kind,
            unit,
            payload: payload.map(str::to_string),
            origin: Origin::from_raw("secondary"),
            timestamp: 1,
        }
    }

    #[tokio::test]
    async fn test_output_tee() {
        let (bus, router, recorder) = setup();
        let mut raw = bus.subscribe();

        router.on_output(Unit::PRIMARY, b'$');
        router.on_output(unit(2), 0x41);

        assert_eq!(*recorder.rendered.lock().unwrap(), "$");
        let msg = raw.next().await.unwrap();
        assert_eq!(msg.kind, MessageKind::Output);
        assert_eq!(msg.unit, 2);
        assert_eq!(msg.payload_str(), "A");
    }

    #[test]
    fn test_input_injected_in_order() {
        let (_bus, router, recorder) = setup();
        router.handle_message(&peer(MessageKind::Input, 3, Some("abc")));
        router.handle_message(&peer(MessageKind::Input, 5, Some("x")));

        assert_eq!(
            *recorder.input.lock().unwrap(),
            vec![(unit(3), b'a'), (unit(3), b'b'), (unit(3), b'c'), (unit(5), b'x')]
        );
    }

    #[test]
    fn test_bad_input_dropped() {
        let (_bus, router, recorder) = setup();
        router.handle_message(&peer(MessageKind::Input, 0, Some("rm")));
        router.handle_message(&peer(MessageKind::Input, 9, Some("rm")));
        router.handle_message(&peer(MessageKind::Output, 2, Some("spoof")));
        assert!(recorder.input.lock().unwrap().is_empty());
        assert!(recorder.rendered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_local_typing_goes_to_unit_zero() {
        let (_bus, router, recorder) = setup();
        router.type_local("ls");
        assert_eq!(
            *recorder.input.lock().unwrap(),
            vec![(Unit::PRIMARY, b'l'), (Unit::PRIMARY, b's')]
        );
    }

    #[tokio::test]
    async fn test_register_acknowledged_with_pong() {
        let (bus, router, _) = setup();
        let mut raw = bus.subscribe();

        router.handle_message(&peer(MessageKind::Register, 4, None));
        assert!(router.registry.is_in_use(unit(4)));

        let ack = raw.next().await.unwrap();
        assert_eq!(ack.kind, MessageKind::Pong);
        assert_eq!(ack.unit, 4);
    }

    #[tokio::test]
    async fn test_ping_answered_with_primary_unit() {
        let (bus, router, _) = setup();
        let mut raw = bus.subscribe();

        router.handle_message(&peer(MessageKind::Ping, -1, None));
        let pong = raw.next().await.unwrap();
        assert_eq!(pong.kind, MessageKind::Pong);
        assert_eq!(pong.unit, 0);
    }

    #[tokio::test]
    async fn test_duplicate_primary_claim_ignored() {
        let (bus, router, _) = setup();
        let mut raw = bus.subscribe();

        router.handle_message(&peer(MessageKind::Register, 0, None));
        router.handle_message(&peer(MessageKind::Unregister, 0, None));
        assert!(router.registry.is_in_use(Unit::PRIMARY));

        // No acknowledgement went out for the bogus claim.
        router.endpoint.publish(MessageKind::Ping, -1, None);
        assert_eq!(raw.next().await.unwrap().kind, MessageKind::Ping);
    }

    #[test]
    fn test_own_messages_ignored() {
        let (_bus, router, recorder) = setup();
        let mut own = peer(MessageKind::Input, 3, Some("x"));
        own.origin = router.endpoint.origin().clone();
        router.handle_message(&own);
        assert!(recorder.input.lock().unwrap().is_empty());
    }
}
