//! Transport context: one dequeued but not yet acknowledged message.

use super::{Envelope, ItemName};

/// Everything the reader knows about a delivered item.
///
/// The context is handed out by `QueueReader::try_get_message` and consumed
/// by `ack_message` or `dead_letter`. Dropping it without either leaves the
/// item pending, so the next poll delivers it again.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportContext {
    item: ItemName,
    bytes: Vec<u8>,
    queue_name: String,
    envelope: Envelope,
}

impl TransportContext {
    pub fn new(item: ItemName, bytes: Vec<u8>, queue_name: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            item,
            bytes,
            queue_name: queue_name.into(),
            envelope,
        }
    }

    /// Raw handle of the item in its queue.
    pub fn item(&self) -> &ItemName {
        &self.item
    }

    /// Payload exactly as it was read from storage.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }
}
