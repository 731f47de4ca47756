//! Fire-and-forget fan-out of runtime messages.

use becwatch_types::RuntimeMessage;
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 64;

/// Broadcast channel between the orchestrator, page contexts, and popups.
///
/// Publishing with no listeners is not an error; a lagging listener loses the
/// oldest messages rather than blocking the publisher.
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<RuntimeMessage>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Returns the number of listeners that received the message.
    pub fn publish(&self, message: RuntimeMessage) -> usize {
        let kind = message.kind();
        match self.tx.send(message) {
            Ok(receivers) => {
                tracing::debug!(kind, receivers, "Published runtime message");
                receivers
            }
            Err(_) => {
                tracing::trace!(kind, "No listeners for runtime message");
                0
            }
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeMessage> {
        self.tx.subscribe()
    }
}
