//! Envelope - 配送単位のメッセージ
//!
//! Envelope は decode 済みのメッセージです。生成後は変更できません。
//! キューから ack されるまでは transport が所有します。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EnvelopeId;

/// Envelope は一意な ID と payload を持つ不変のメッセージ
///
/// # 不変条件
/// - `envelope_id` はリトライの間ずっと同じ値
/// - payload の形式はアプリケーションの handler が決める
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    envelope_id: EnvelopeId,
    created_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl Envelope {
    pub fn new(envelope_id: EnvelopeId, created_at: DateTime<Utc>, payload: serde_json::Value) -> Self {
        Self {
            envelope_id,
            created_at,
            payload,
        }
    }

    pub fn envelope_id(&self) -> &EnvelopeId {
        &self.envelope_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}
