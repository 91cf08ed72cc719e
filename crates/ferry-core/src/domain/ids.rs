//! Domain identifiers (strongly-typed string IDs).
//!
//! Both identifiers are opaque strings on the wire. Fresh values are built
//! from ULIDs so they sort roughly by creation time, but nothing in the
//! transport depends on that ordering.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use ulid::Ulid;

/// Identity of an envelope across its whole retry lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvelopeId(String);

impl EnvelopeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for EnvelopeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for EnvelopeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvelopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Name of one item (file) inside a queue directory.
///
/// Assigned by the transport when the item is published and kept unchanged
/// when the item is moved to the poison or dead-letter store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemName(String);

impl ItemName {
    /// Extension given to items published by `QueueWriter`.
    pub const EXTENSION: &'static str = "msg";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(format!("{}.{}", ulid, Self::EXTENSION))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Same name with a ULID appended, for moves whose target name is taken.
    pub fn disambiguated(&self, ulid: Ulid) -> Self {
        Self(format!("{}.{}", self.0, ulid))
    }

    /// Hidden names (leading `.`) are staging files and never listed as items.
    pub fn is_hidden(&self) -> bool {
        self.0.starts_with('.')
    }
}

impl From<&str> for ItemName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for ItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
