//! EnvelopeCodec port - bytes と Envelope の相互変換
//!
//! # 実装
//! - **JsonEnvelopeCodec**: serde_json ベース

use thiserror::Error;

use crate::domain::Envelope;

/// CodecError は encode/decode の失敗
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("envelope has an empty envelope_id")]
    MissingId,

    #[error("failed to encode envelope: {0}")]
    Encode(String),
}

/// EnvelopeCodec は payload の形式を知っている唯一の場所
///
/// decode が失敗した item は reader によって poison store に移されます。
pub trait EnvelopeCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Envelope, CodecError>;

    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, CodecError>;
}
