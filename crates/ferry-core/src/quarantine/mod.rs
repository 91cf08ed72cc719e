//! Quarantine: bounded retry budget per envelope.
//!
//! The dispatch loop reports every failed handler run here. The store answers
//! one question: retry the message, or give up on it. Moving a given-up
//! message somewhere else is the caller's job (see `QueueReader::dead_letter`).

mod memory;

pub use memory::MemoryQuarantine;

use crate::domain::Envelope;

/// Retry budget shared by every envelope in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuarantinePolicy {
    /// Failure count at which an envelope is abandoned.
    pub max_attempts: u32,
}

impl QuarantinePolicy {
    /// Three tolerated failures; the fourth abandons the envelope.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Should an envelope that has now failed `failures` times be abandoned?
    pub fn should_abandon(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}

impl Default for QuarantinePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Decides retry vs. abandonment for failed processing attempts.
///
/// Implementations are shared by all dispatch workers and must be safe to
/// call concurrently without external locking.
pub trait EnvelopeQuarantine: Send + Sync {
    /// Record one failure. Returns `true` when the message must be abandoned.
    ///
    /// `None` means the failure happened before an envelope existed (decode
    /// failure). Such a failure cannot be tracked and is always permanent.
    fn try_to_quarantine(&self, envelope: Option<&Envelope>, cause: &str) -> bool;

    /// Forget any failures recorded for the envelope. Idempotent.
    fn try_release(&self, envelope: Option<&Envelope>);
}
