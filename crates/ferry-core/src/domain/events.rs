//! Events - 障害通知イベント
//!
//! Observer に通知されるイベントです。どのイベントも原因（cause）と
//! queue/item の識別子を持ちます。cause は文字列化して保持するので、
//! イベントは Clone でき、スレッド間で自由に受け渡せます。

use std::fmt;

use serde::Serialize;

use super::{EnvelopeId, ItemName};

/// SystemEvent は transport で発生した障害・状態変化
///
/// # イベント種類
/// - FailedToReadMessage: キューの列挙に失敗
/// - FailedToAccessStorage: item の読み込みに失敗（busy 以外）
/// - EnvelopeDeserializationFailed: payload の decode に失敗
/// - PoisonRelocationFailed: poison への移動に失敗
/// - MessageDeadLettered: リトライ上限で dead-letter へ移動
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SystemEvent {
    FailedToReadMessage {
        queue: String,
        cause: String,
    },
    FailedToAccessStorage {
        queue: String,
        item: ItemName,
        cause: String,
    },
    EnvelopeDeserializationFailed {
        queue: String,
        item: ItemName,
        cause: String,
    },
    PoisonRelocationFailed {
        queue: String,
        item: ItemName,
        cause: String,
    },
    MessageDeadLettered {
        queue: String,
        item: ItemName,
        envelope_id: EnvelopeId,
    },
}

impl SystemEvent {
    pub fn queue(&self) -> &str {
        match self {
            SystemEvent::FailedToReadMessage { queue, .. }
            | SystemEvent::FailedToAccessStorage { queue, .. }
            | SystemEvent::EnvelopeDeserializationFailed { queue, .. }
            | SystemEvent::PoisonRelocationFailed { queue, .. }
            | SystemEvent::MessageDeadLettered { queue, .. } => queue,
        }
    }

    pub fn item(&self) -> Option<&ItemName> {
        match self {
            SystemEvent::FailedToReadMessage { .. } => None,
            SystemEvent::FailedToAccessStorage { item, .. }
            | SystemEvent::EnvelopeDeserializationFailed { item, .. }
            | SystemEvent::PoisonRelocationFailed { item, .. }
            | SystemEvent::MessageDeadLettered { item, .. } => Some(item),
        }
    }

    /// Short machine-friendly name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SystemEvent::FailedToReadMessage { .. } => "failed_to_read_message",
            SystemEvent::FailedToAccessStorage { .. } => "failed_to_access_storage",
            SystemEvent::EnvelopeDeserializationFailed { .. } => "envelope_deserialization_failed",
            SystemEvent::PoisonRelocationFailed { .. } => "poison_relocation_failed",
            SystemEvent::MessageDeadLettered { .. } => "message_dead_lettered",
        }
    }
}

impl fmt::Display for SystemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemEvent::FailedToReadMessage { queue, cause } => {
                write!(f, "failed to read queue `{queue}`: {cause}")
            }
            SystemEvent::FailedToAccessStorage { queue, item, cause } => {
                write!(f, "failed to access `{queue}/{item}`: {cause}")
            }
            SystemEvent::EnvelopeDeserializationFailed { queue, item, cause } => {
                write!(f, "failed to decode `{queue}/{item}`: {cause}")
            }
            SystemEvent::PoisonRelocationFailed { queue, item, cause } => {
                write!(f, "failed to move `{queue}/{item}` to poison: {cause}")
            }
            SystemEvent::MessageDeadLettered {
                queue,
                item,
                envelope_id,
            } => write!(f, "dead-lettered `{queue}/{item}` (envelope {envelope_id})"),
        }
    }
}
