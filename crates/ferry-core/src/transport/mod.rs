//! Transport: directory-backed queue reader and writer.
//!
//! A logical queue owns three storage locations: the queue itself, a poison
//! store for undecodable items and a dead-letter store for items abandoned by
//! the quarantine. Both side stores are siblings of the queue and are created
//! the first time an item is moved there.

mod reader;
mod writer;

pub use reader::QueueReader;
pub use writer::QueueWriter;

/// Storage names of one logical queue and its side stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLayout {
    pub queue: String,
    pub poison: String,
    pub dead_letter: String,
}

impl QueueLayout {
    pub const DEFAULT_POISON_SUFFIX: &'static str = "-poison";
    pub const DEFAULT_DEAD_LETTER_SUFFIX: &'static str = "-dead";

    pub fn new(queue: impl Into<String>) -> Self {
        Self::with_suffixes(
            queue,
            Self::DEFAULT_POISON_SUFFIX,
            Self::DEFAULT_DEAD_LETTER_SUFFIX,
        )
    }

    pub fn with_suffixes(queue: impl Into<String>, poison_suffix: &str, dead_letter_suffix: &str) -> Self {
        let queue = queue.into();
        Self {
            poison: format!("{queue}{poison_suffix}"),
            dead_letter: format!("{queue}{dead_letter_suffix}"),
            queue,
        }
    }
}
