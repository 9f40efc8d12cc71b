//! Best-effort multicast bus between execution contexts.

use futures::{StreamExt, stream::BoxStream};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

use crate::Message;

/// Default number of in-flight messages a slow listener may fall behind by.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Stream of messages delivered to one subscriber.
pub type MessageStream = BoxStream<'static, Message>;

/// Multicast publish/subscribe primitive.
///
/// Contract:
/// - `publish` reaches every listener attached at that moment, the sender included.
/// - No acknowledgement, no persistence, no delivery to late subscribers.
/// - Messages from one sender arrive at one listener in publish order.
/// - No ordering across different senders.
pub trait Bus: Send + Sync {
    /// Send a message to all current listeners.
    fn publish(&self, msg: Message);

    /// Attach a new listener.
    fn subscribe(&self) -> MessageStream;
}

/// In-process bus backed by a tokio broadcast channel.
///
/// Listeners that fall more than `capacity` messages behind lose the
/// overflow; the loss is logged and delivery continues.
#[derive(Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<Message>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LocalBus {
    /// Create a bus with the given per-listener backlog.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Number of attached listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Bus for LocalBus {
    fn publish(&self, msg: Message) {
        // No listeners is not an error on a best-effort bus.
        let _ = self.sender.send(msg);
    }

    fn subscribe(&self) -> MessageStream {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|res| async move {
                match res {
                    Ok(msg) => Some(msg),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Bus listener lagged, messages dropped");
                        None
                    }
                }
            })
            .boxed()
    }
}
