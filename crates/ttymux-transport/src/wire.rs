//! A bus that carries only encoded text, like a socket or host channel.

use futures::{StreamExt, future};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use ttymux_core::{Bus, Message, MessageStream};

use crate::protocol::{decode, encode};

/// In-process bus whose frames are JSON text.
///
/// Every message is encoded on publish and decoded per listener, so
/// components exercise the same codec a cross-process transport uses.
/// Frames that fail to decode are logged and skipped.
#[derive(Clone)]
pub struct WireBus {
    sender: broadcast::Sender<String>,
}

impl WireBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Inject a raw frame, as a foreign peer would.
    pub fn publish_raw(&self, frame: impl Into<String>) {
        let _ = self.sender.send(frame.into());
    }
}

impl Bus for WireBus {
    fn publish(&self, msg: Message) {
        match encode(&msg) {
            Ok(frame) => self.publish_raw(frame),
            Err(e) => tracing::error!("Failed to encode message: {e}"),
        }
    }

    fn subscribe(&self) -> MessageStream {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|res| {
                future::ready(match res {
                    Ok(frame) => match decode(&frame) {
                        Ok(msg) => Some(msg),
                        Err(e) => {
                            tracing::error!("Dropping undecodable frame: {e}");
                            None
                        }
                    },
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Wire listener lagged, frames dropped");
                        None
                    }
                })
            })
            .boxed()
    }
}
