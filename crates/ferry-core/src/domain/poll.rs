//! Poll outcome: the closed result set of one `try_get_message` call.

use super::TransportContext;

/// Result of polling a queue once.
///
/// State transitions for one item:
/// - Pending -> Success (delivered, not yet acked) -> ack -> Removed
/// - Pending -> Retry (busy or unreadable; item stays pending)
/// - Pending -> Retry (undecodable; item moved to the poison store)
///
/// `Error` means the queue itself could not be enumerated, or a poison
/// relocation failed; the caller applies its own backoff.
#[derive(Debug, Clone, PartialEq)]
pub enum GetMessageResult {
    /// Nothing pending.
    Empty,

    /// One item, ready for the handler.
    Success(TransportContext),

    /// Try again on the next poll.
    Retry,

    /// Queue-level failure.
    Error,
}

impl GetMessageResult {
    pub fn is_success(&self) -> bool {
        matches!(self, GetMessageResult::Success(_))
    }

    /// Take the context out of a `Success`.
    pub fn into_context(self) -> Option<TransportContext> {
        match self {
            GetMessageResult::Success(context) => Some(context),
            GetMessageResult::Empty | GetMessageResult::Retry | GetMessageResult::Error => None,
        }
    }
}
