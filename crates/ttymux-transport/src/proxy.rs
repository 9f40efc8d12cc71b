//! Secondary-side presentation of one unit.

use std::sync::Arc;

use ttymux_core::{BROADCAST_UNIT, Endpoint, Message, MessageKind, Surface, Unit};
use ttymux_session::SessionRegistry;

/// Renders one unit's output and forwards its keystrokes.
///
/// Holds no device reference: all input leaves as `input` messages.
pub struct SessionProxy {
    endpoint: Arc<Endpoint>,
    registry: Arc<SessionRegistry>,
    unit: Unit,
    surface: Arc<dyn Surface>,
}

impl SessionProxy {
    #[must_use]
    pub fn new(
        endpoint: Arc<Endpoint>,
        registry: Arc<SessionRegistry>,
        unit: Unit,
        surface: Arc<dyn Surface>,
    ) -> Self {
        Self {
            endpoint,
            registry,
            unit,
            surface,
        }
    }

    #[must_use]
    pub const fn unit(&self) -> Unit {
        self.unit
    }

    /// Announce the binding and ask peers for the roster.
    pub fn start(&self) {
        self.registry.register(self.unit);
        self.endpoint.publish(MessageKind::Ping, BROADCAST_UNIT, None);
    }

    /// Forward keystrokes typed on the local surface.
    pub fn keystroke(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.endpoint
            .send(MessageKind::Input, self.unit, Some(text.to_string()));
    }

    /// Release the unit.
    pub fn shutdown(&self) {
        self.registry.unregister(self.unit);
    }

    /// Handle one message from a peer.
    pub fn handle_message(&self, msg: &Message) {
        if self.endpoint.is_own(msg) {
            return;
        }
        match msg.kind {
            MessageKind::Output => {
                if msg.target() == Some(self.unit) {
                    self.surface.render(msg.payload_str());
                }
            }
            MessageKind::Register | MessageKind::Unregister | MessageKind::Pong => {
                self.registry.on_peer_message(msg);
            }
            MessageKind::Ping => {
                self.endpoint.send(MessageKind::Pong, self.unit, None);
            }
            MessageKind::Input => {}
        }
    }
}
