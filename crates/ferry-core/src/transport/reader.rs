//! Queue reader: one pending item per poll, failures folded into
//! `GetMessageResult`.

use std::sync::Arc;

use tracing::{debug, info, warn};
use ulid::Ulid;

use super::QueueLayout;
use crate::domain::{GetMessageResult, ItemName, SystemEvent, TransportContext};
use crate::error::FerryError;
use crate::ports::{EnvelopeCodec, QueueStorage, StorageError, SystemObserver};

/// Reads one logical queue.
///
/// Driven by a single polling sequence. `try_get_message` never fails: every
/// fault becomes `Retry` or `Error` and, except for busy items, is reported
/// to the observer.
///
/// Reading does not remove anything. An item stays in the queue until
/// `ack_message` deletes it, so a crash between handling and ack delivers it
/// again (at-least-once).
pub struct QueueReader {
    layout: QueueLayout,
    storage: Arc<dyn QueueStorage>,
    codec: Arc<dyn EnvelopeCodec>,
    observer: Arc<dyn SystemObserver>,
}

impl QueueReader {
    pub fn new(
        layout: QueueLayout,
        storage: Arc<dyn QueueStorage>,
        codec: Arc<dyn EnvelopeCodec>,
        observer: Arc<dyn SystemObserver>,
    ) -> Self {
        Self {
            layout,
            storage,
            codec,
            observer,
        }
    }

    pub fn name(&self) -> &str {
        &self.layout.queue
    }

    pub fn layout(&self) -> &QueueLayout {
        &self.layout
    }

    /// Create the queue's backing location. Idempotent.
    pub fn initialize(&self) -> Result<(), FerryError> {
        self.storage.ensure_queue(&self.layout.queue)?;
        Ok(())
    }

    /// Poll the queue once.
    ///
    /// 1. pick one item (listing failure -> `Error`, nothing -> `Empty`)
    /// 2. read it (busy -> silent `Retry`, other failure -> `Retry`)
    /// 3. decode it (failure -> move to poison, `Retry`)
    pub fn try_get_message(&self) -> GetMessageResult {
        let queue = self.layout.queue.as_str();

        let item = match self.storage.first_item(queue) {
            Ok(Some(item)) => item,
            Ok(None) => return GetMessageResult::Empty,
            Err(err) => {
                self.observer.notify(SystemEvent::FailedToReadMessage {
                    queue: queue.to_string(),
                    cause: err.to_string(),
                });
                return GetMessageResult::Error;
            }
        };

        let bytes = match self.storage.read_item(queue, &item) {
            Ok(bytes) => bytes,
            Err(err) if err.is_busy() => {
                // expected while a writer still holds the file
                debug!(queue, %item, "item is busy, retrying later");
                return GetMessageResult::Retry;
            }
            Err(err) => {
                self.observer.notify(SystemEvent::FailedToAccessStorage {
                    queue: queue.to_string(),
                    item,
                    cause: err.to_string(),
                });
                return GetMessageResult::Retry;
            }
        };

        match self.codec.decode(&bytes) {
            Ok(envelope) => {
                debug!(queue, %item, envelope_id = %envelope.envelope_id(), "dequeued item");
                GetMessageResult::Success(TransportContext::new(item, bytes, queue, envelope))
            }
            Err(err) => {
                self.observer.notify(SystemEvent::EnvelopeDeserializationFailed {
                    queue: queue.to_string(),
                    item: item.clone(),
                    cause: err.to_string(),
                });
                self.move_to_poison(item)
            }
        }
    }

    fn move_to_poison(&self, item: ItemName) -> GetMessageResult {
        let queue = self.layout.queue.as_str();
        match self.relocate(&item, &self.layout.poison) {
            Ok(stored) => {
                info!(queue, %item, poison = %self.layout.poison, %stored, "moved undecodable item to poison");
                GetMessageResult::Retry
            }
            Err(err) => {
                self.observer.notify(SystemEvent::PoisonRelocationFailed {
                    queue: queue.to_string(),
                    item,
                    cause: err.to_string(),
                });
                GetMessageResult::Error
            }
        }
    }

    /// Move `item` out of the queue into the side store `to`.
    ///
    /// The item keeps its name unless `to` already holds one of that name;
    /// then it is stored as `<name>.<ulid>` and the older item is left as is.
    /// Returns the name the item was stored under.
    fn relocate(&self, item: &ItemName, to: &str) -> Result<ItemName, StorageError> {
        let queue = self.layout.queue.as_str();
        match self.storage.relocate(queue, item, to) {
            Ok(()) => Ok(item.clone()),
            Err(StorageError::AlreadyExists { .. }) => {
                let renamed = item.disambiguated(Ulid::new());
                warn!(queue, %item, to, %renamed, "name already taken, storing under a new name");
                self.storage.relocate_as(queue, item, to, &renamed)?;
                Ok(renamed)
            }
            Err(err) => Err(err),
        }
    }

    /// Acknowledge a delivered message by deleting its item.
    ///
    /// Call only after the handler has fully completed. The context must come
    /// from this reader.
    pub fn ack_message(&self, context: TransportContext) -> Result<(), FerryError> {
        self.check_owned(&context)?;
        self.storage.delete_item(&self.layout.queue, context.item())?;
        debug!(
            queue = %self.layout.queue,
            item = %context.item(),
            envelope_id = %context.envelope().envelope_id(),
            "acked item"
        );
        Ok(())
    }

    /// Move a message the quarantine gave up on into the dead-letter store.
    ///
    /// An existing dead-letter item of the same name is never overwritten;
    /// the newcomer is stored under a disambiguated name instead.
    pub fn dead_letter(&self, context: TransportContext) -> Result<(), FerryError> {
        self.check_owned(&context)?;
        let stored = self.relocate(context.item(), &self.layout.dead_letter)?;
        debug!(queue = %self.layout.queue, item = %context.item(), %stored, "dead-lettered item");
        self.observer.notify(SystemEvent::MessageDeadLettered {
            queue: self.layout.queue.clone(),
            item: context.item().clone(),
            envelope_id: context.envelope().envelope_id().clone(),
        });
        Ok(())
    }

    /// Items currently pending in the queue.
    pub fn pending(&self) -> Result<Vec<ItemName>, FerryError> {
        Ok(self.storage.list_items(&self.layout.queue)?)
    }

    fn check_owned(&self, context: &TransportContext) -> Result<(), FerryError> {
        if context.queue_name() != self.layout.queue {
            return Err(FerryError::ForeignContext {
                queue: context.queue_name().to_string(),
                item: context.item().clone(),
                expected: self.layout.queue.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Envelope, EnvelopeId};
    use crate::impls::{FileSystemStorage, InMemoryStorage, JsonEnvelopeCodec, RecordingObserver};
    use chrono::Utc;
    use std::io;
    use tempfile::TempDir;

    const QUEUE: &str = "inbox";

    struct Fixture {
        storage: Arc<InMemoryStorage>,
        observer: Arc<RecordingObserver>,
        reader: QueueReader,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(InMemoryStorage::new());
        let observer = Arc::new(RecordingObserver::new());
        let reader = QueueReader::new(
            QueueLayout::new(QUEUE),
            storage.clone(),
            Arc::new(JsonEnvelopeCodec),
            observer.clone(),
        );
        reader.initialize().unwrap();
        Fixture {
            storage,
            observer,
            reader,
        }
    }

    fn encoded(id: &str) -> Vec<u8> {
        let env = Envelope::new(EnvelopeId::new(id), Utc::now(), serde_json::json!({"id": id}));
        serde_json::to_vec(&env).unwrap()
    }

    #[test]
    fn initialize_is_idempotent() {
        let f = fixture();
        f.reader.initialize().unwrap();
        assert!(f.storage.queue_exists(QUEUE));
    }

    #[test]
    fn empty_queue_returns_empty_without_side_effects() {
        let f = fixture();
        assert_eq!(f.reader.try_get_message(), GetMessageResult::Empty);
        assert!(f.observer.events().is_empty());
        assert!(!f.storage.queue_exists("inbox-poison"));
    }

    #[test]
    fn enumeration_failure_is_an_error_and_notified() {
        let f = fixture();
        f.storage.fail_listing(QUEUE, true);

        assert_eq!(f.reader.try_get_message(), GetMessageResult::Error);
        assert_eq!(f.observer.count("failed_to_read_message"), 1);
    }

    #[test]
    fn uninitialized_queue_cannot_be_read() {
        let storage = Arc::new(InMemoryStorage::new());
        let observer = Arc::new(RecordingObserver::new());
        let reader = QueueReader::new(
            QueueLayout::new(QUEUE),
            storage,
            Arc::new(JsonEnvelopeCodec),
            observer.clone(),
        );

        assert_eq!(reader.try_get_message(), GetMessageResult::Error);
        assert_eq!(observer.count("failed_to_read_message"), 1);
    }

    #[test]
    fn well_formed_item_is_delivered_without_being_removed() {
        let f = fixture();
        let item = ItemName::new("a.msg");
        let bytes = encoded("e-1");
        f.storage.write_item(QUEUE, &item, &bytes).unwrap();

        let first = f.reader.try_get_message().into_context().unwrap();
        assert_eq!(first.item(), &item);
        assert_eq!(first.bytes(), bytes.as_slice());
        assert_eq!(first.queue_name(), QUEUE);
        assert_eq!(first.envelope().envelope_id().as_str(), "e-1");

        // not acked yet: the same item comes back
        let second = f.reader.try_get_message().into_context().unwrap();
        assert_eq!(second, first);
        assert!(f.storage.contains(QUEUE, &item));
    }

    #[test]
    fn acked_item_is_gone_for_good() {
        let f = fixture();
        let item = ItemName::new("a.msg");
        f.storage.write_item(QUEUE, &item, &encoded("e-1")).unwrap();

        let context = f.reader.try_get_message().into_context().unwrap();
        f.reader.ack_message(context).unwrap();

        assert!(!f.storage.contains(QUEUE, &item));
        assert_eq!(f.reader.try_get_message(), GetMessageResult::Empty);
    }

    #[test]
    fn ack_rejects_a_context_from_another_queue() {
        let f = fixture();
        let item = ItemName::new("a.msg");
        f.storage.write_item(QUEUE, &item, &encoded("e-1")).unwrap();
        let context = f.reader.try_get_message().into_context().unwrap();
        let foreign = TransportContext::new(
            context.item().clone(),
            context.bytes().to_vec(),
            "elsewhere",
            context.envelope().clone(),
        );

        let err = f.reader.ack_message(foreign).unwrap_err();
        assert!(matches!(err, FerryError::ForeignContext { .. }));
        assert!(f.storage.contains(QUEUE, &item));
    }

    #[test]
    fn acking_twice_through_a_clone_fails_on_the_missing_item() {
        let f = fixture();
        f.storage
            .write_item(QUEUE, &ItemName::new("a.msg"), &encoded("e-1"))
            .unwrap();
        let context = f.reader.try_get_message().into_context().unwrap();

        f.reader.ack_message(context.clone()).unwrap();
        let err = f.reader.ack_message(context).unwrap_err();
        assert!(matches!(
            err,
            FerryError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn undecodable_item_is_moved_to_poison() {
        let f = fixture();
        let item = ItemName::new("bad.msg");
        f.storage.write_item(QUEUE, &item, b"not an envelope").unwrap();

        assert_eq!(f.reader.try_get_message(), GetMessageResult::Retry);

        assert!(!f.storage.contains(QUEUE, &item));
        assert!(f.storage.contains("inbox-poison", &item));
        assert_eq!(f.observer.count("envelope_deserialization_failed"), 1);
        assert_eq!(f.reader.try_get_message(), GetMessageResult::Empty);
    }

    fn names_in(storage: &InMemoryStorage, queue: &str) -> Vec<ItemName> {
        storage.list_items(queue).unwrap()
    }

    #[test]
    fn poison_collision_keeps_both_items_and_unblocks_the_queue() {
        let f = fixture();
        let item = ItemName::new("0.msg");
        f.storage.write_item("inbox-poison", &item, b"older").unwrap();
        f.storage.write_item(QUEUE, &item, b"newer garbage").unwrap();
        f.storage
            .write_item(QUEUE, &ItemName::new("1.msg"), &encoded("e-1"))
            .unwrap();

        assert_eq!(f.reader.try_get_message(), GetMessageResult::Retry);

        assert!(!f.storage.contains(QUEUE, &item));
        assert_eq!(f.storage.read_item("inbox-poison", &item).unwrap(), b"older");
        let poison = names_in(&f.storage, "inbox-poison");
        assert_eq!(poison.len(), 2);
        let renamed = poison.iter().find(|name| **name != item).unwrap();
        assert!(renamed.as_str().starts_with("0.msg."));
        assert_eq!(f.storage.read_item("inbox-poison", renamed).unwrap(), b"newer garbage");

        // the well-formed item behind it is delivered next
        let context = f.reader.try_get_message().into_context().unwrap();
        assert_eq!(context.envelope().envelope_id().as_str(), "e-1");
        assert_eq!(f.observer.count("envelope_deserialization_failed"), 1);
        assert_eq!(f.observer.count("poison_relocation_failed"), 0);
    }

    #[test]
    fn failed_poison_move_is_an_error_and_notified() {
        let f = fixture();
        let item = ItemName::new("bad.msg");
        f.storage.write_item(QUEUE, &item, b"garbage").unwrap();
        f.storage.fail_relocations_to("inbox-poison", true);

        assert_eq!(f.reader.try_get_message(), GetMessageResult::Error);

        assert!(f.storage.contains(QUEUE, &item));
        assert_eq!(f.observer.count("envelope_deserialization_failed"), 1);
        assert_eq!(f.observer.count("poison_relocation_failed"), 1);
    }

    #[test]
    fn busy_item_is_retried_silently() {
        let f = fixture();
        let item = ItemName::new("a.msg");
        f.storage.write_item(QUEUE, &item, &encoded("e-1")).unwrap();
        f.storage.set_busy(QUEUE, &item, true);

        assert_eq!(f.reader.try_get_message(), GetMessageResult::Retry);
        assert!(f.storage.contains(QUEUE, &item));
        assert!(f.observer.events().is_empty());

        f.storage.set_busy(QUEUE, &item, false);
        assert!(f.reader.try_get_message().is_success());
    }

    #[test]
    fn other_read_failures_are_retried_and_notified() {
        let f = fixture();
        let item = ItemName::new("a.msg");
        f.storage.write_item(QUEUE, &item, &encoded("e-1")).unwrap();
        f.storage.fail_reads(QUEUE, &item, io::ErrorKind::PermissionDenied);

        assert_eq!(f.reader.try_get_message(), GetMessageResult::Retry);
        assert!(f.storage.contains(QUEUE, &item));
        let events = f.observer.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            SystemEvent::FailedToAccessStorage { queue, item: failed, .. }
                if queue == QUEUE && failed == &item
        ));
    }

    #[test]
    fn dead_letter_moves_item_aside() {
        let f = fixture();
        let item = ItemName::new("a.msg");
        f.storage.write_item(QUEUE, &item, &encoded("e-1")).unwrap();
        let context = f.reader.try_get_message().into_context().unwrap();

        f.reader.dead_letter(context).unwrap();

        assert!(!f.storage.contains(QUEUE, &item));
        assert!(f.storage.contains("inbox-dead", &item));
        assert_eq!(f.observer.count("message_dead_lettered"), 1);
        assert_eq!(f.reader.try_get_message(), GetMessageResult::Empty);
    }

    #[test]
    fn dead_letter_collision_stores_under_a_new_name() {
        let f = fixture();
        let item = ItemName::new("a.msg");
        f.storage.write_item("inbox-dead", &item, b"earlier").unwrap();
        f.storage.write_item(QUEUE, &item, &encoded("e-1")).unwrap();
        let context = f.reader.try_get_message().into_context().unwrap();

        f.reader.dead_letter(context).unwrap();

        assert!(!f.storage.contains(QUEUE, &item));
        assert_eq!(f.storage.read_item("inbox-dead", &item).unwrap(), b"earlier");
        assert_eq!(names_in(&f.storage, "inbox-dead").len(), 2);
        assert_eq!(f.observer.count("message_dead_lettered"), 1);
    }

    #[test]
    fn filesystem_queue_end_to_end() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(FileSystemStorage::new(dir.path()));
        let observer = Arc::new(RecordingObserver::new());
        let reader = QueueReader::new(
            QueueLayout::new(QUEUE),
            storage,
            Arc::new(JsonEnvelopeCodec),
            observer.clone(),
        );
        reader.initialize().unwrap();

        std::fs::write(dir.path().join("inbox/01-bad.msg"), b"{oops").unwrap();
        std::fs::write(dir.path().join("inbox/02-good.msg"), encoded("e-2")).unwrap();

        assert_eq!(reader.try_get_message(), GetMessageResult::Retry);
        assert!(dir.path().join("inbox-poison/01-bad.msg").is_file());
        assert!(!dir.path().join("inbox/01-bad.msg").exists());

        let context = reader.try_get_message().into_context().unwrap();
        assert_eq!(context.item().as_str(), "02-good.msg");
        reader.ack_message(context).unwrap();

        assert!(!dir.path().join("inbox/02-good.msg").exists());
        assert_eq!(reader.try_get_message(), GetMessageResult::Empty);
        assert_eq!(observer.count("envelope_deserialization_failed"), 1);
    }

    #[test]
    fn filesystem_poison_collision_does_not_stall_the_queue() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(FileSystemStorage::new(dir.path()));
        let observer = Arc::new(RecordingObserver::new());
        let reader = QueueReader::new(
            QueueLayout::new(QUEUE),
            storage,
            Arc::new(JsonEnvelopeCodec),
            observer.clone(),
        );
        reader.initialize().unwrap();

        std::fs::create_dir(dir.path().join("inbox-poison")).unwrap();
        std::fs::write(dir.path().join("inbox-poison/0.msg"), b"older junk").unwrap();
        std::fs::write(dir.path().join("inbox/0.msg"), b"junk").unwrap();
        std::fs::write(dir.path().join("inbox/1.msg"), encoded("e-1")).unwrap();

        let outcomes: Vec<_> = (0..3).map(|_| reader.try_get_message()).collect();
        assert_eq!(outcomes[0], GetMessageResult::Retry);
        assert!(outcomes[1].is_success());
        assert!(outcomes[2].is_success());

        assert_eq!(std::fs::read(dir.path().join("inbox-poison/0.msg")).unwrap(), b"older junk");
        assert_eq!(std::fs::read_dir(dir.path().join("inbox-poison")).unwrap().count(), 2);
        assert_eq!(observer.count("envelope_deserialization_failed"), 1);
    }
}
