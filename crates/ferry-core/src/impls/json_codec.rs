//! JsonEnvelopeCodec - serde_json による EnvelopeCodec

use crate::domain::Envelope;
use crate::ports::{CodecError, EnvelopeCodec};

/// Envelope を JSON 1 オブジェクトとして保存する codec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEnvelopeCodec;

impl EnvelopeCodec for JsonEnvelopeCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Envelope, CodecError> {
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;
        if envelope.envelope_id().is_empty() {
            return Err(CodecError::MissingId);
        }
        Ok(envelope)
    }

    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(envelope).map_err(|e| CodecError::Encode(e.to_string()))
    }
}
