use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::ItemName;
use crate::ports::{CodecError, StorageError};

#[derive(Debug, Error)]
pub enum FerryError {
    #[error("context for `{queue}/{item}` does not belong to queue `{expected}`")]
    ForeignContext {
        queue: String,
        item: ItemName,
        expected: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("blocking storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
