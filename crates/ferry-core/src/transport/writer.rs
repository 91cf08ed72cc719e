//! Queue writer: publishes envelopes as new items.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{Envelope, ItemName};
use crate::error::FerryError;
use crate::ports::{Clock, EnvelopeCodec, IdGenerator, QueueStorage, SystemClock, UlidGenerator};

/// Publishes items into one queue.
///
/// Each message gets a fresh ULID item name. The storage makes the item
/// visible only once it is complete.
pub struct QueueWriter {
    queue: String,
    storage: Arc<dyn QueueStorage>,
    codec: Arc<dyn EnvelopeCodec>,
    ids: Box<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl QueueWriter {
    pub fn new(queue: impl Into<String>, storage: Arc<dyn QueueStorage>, codec: Arc<dyn EnvelopeCodec>) -> Self {
        Self {
            queue: queue.into(),
            storage,
            codec,
            ids: Box::new(UlidGenerator::new(SystemClock)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for item names and envelope timestamps.
    pub fn with_clock<C: Clock + Clone + 'static>(mut self, clock: C) -> Self {
        self.ids = Box::new(UlidGenerator::new(clock.clone()));
        self.clock = Arc::new(clock);
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Build an envelope with a fresh id, stamped with the writer's clock.
    pub fn compose(&self, payload: serde_json::Value) -> Envelope {
        Envelope::new(self.ids.generate_envelope_id(), self.clock.now(), payload)
    }

    /// Encode and publish an envelope.
    pub fn send(&self, envelope: &Envelope) -> Result<ItemName, FerryError> {
        let bytes = self.codec.encode(envelope)?;
        let item = self.send_raw(&bytes)?;
        debug!(queue = %self.queue, %item, envelope_id = %envelope.envelope_id(), "sent envelope");
        Ok(item)
    }

    /// Publish pre-encoded bytes as-is.
    pub fn send_raw(&self, bytes: &[u8]) -> Result<ItemName, FerryError> {
        let item = self.ids.generate_item_name();
        self.storage.write_item(&self.queue, &item, bytes)?;
        Ok(item)
    }
}
