//! Handler trait - メッセージを処理するアプリケーションコード

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Envelope;

/// HandlerError は処理の失敗
///
/// どの variant も quarantine に報告され、リトライ上限までは再配送されます。
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// MessageHandler は decode 済みの Envelope を処理する
///
/// # 使用例
/// ```ignore
/// struct PrintHandler;
///
/// #[async_trait]
/// impl MessageHandler for PrintHandler {
///     async fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError> {
///         println!("{}", envelope.payload());
///         Ok(())
///     }
/// }
/// ```
///
/// `Ok` を返した時点で item は削除されます。処理は返る前に
/// 永続的に完了していなければなりません。
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError>;
}
