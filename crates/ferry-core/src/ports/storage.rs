//! QueueStorage port - キューの永続化層
//!
//! キューは「1 メッセージ = 1 item」のディレクトリとして表現します。
//! プラットフォーム依存の処理（上書きしない移動、busy 判定）はこの trait の
//! 実装側に閉じ込めます。
//!
//! # 実装
//! - **FileSystemStorage**: 本番用（ディレクトリ + ファイル）
//! - **InMemoryStorage**: テスト用（障害注入つき）

use std::io;

use thiserror::Error;

use crate::domain::ItemName;

/// StorageError は storage 操作の失敗
///
/// `is_busy()` が transient な競合（他プロセスがファイルを掴んでいる）と
/// それ以外（存在しない・壊れている・権限がない など）を区別します。
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("item `{queue}/{item}` is locked by another process")]
    Busy {
        queue: String,
        item: ItemName,
        #[source]
        source: io::Error,
    },

    #[error("item `{queue}/{item}` not found")]
    NotFound { queue: String, item: ItemName },

    #[error("item `{queue}/{item}` already exists")]
    AlreadyExists { queue: String, item: ItemName },

    #[error("storage i/o failed on `{target}`: {source}")]
    Io {
        target: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub fn io(target: impl Into<String>, source: io::Error) -> Self {
        StorageError::Io {
            target: target.into(),
            source,
        }
    }

    /// Classify an I/O error raised while touching one item.
    pub fn for_item(queue: &str, item: &ItemName, source: io::Error) -> Self {
        if is_busy_io(&source) {
            StorageError::Busy {
                queue: queue.to_string(),
                item: item.clone(),
                source,
            }
        } else if source.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound {
                queue: queue.to_string(),
                item: item.clone(),
            }
        } else {
            StorageError::io(format!("{queue}/{item}"), source)
        }
    }

    /// Transient "in use by another writer/reader" condition.
    pub fn is_busy(&self) -> bool {
        matches!(self, StorageError::Busy { .. })
    }
}

/// True when the OS reports that the file is locked or in use.
pub fn is_busy_io(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::ResourceBusy | io::ErrorKind::ExecutableFileBusy | io::ErrorKind::WouldBlock
    ) {
        return true;
    }
    is_sharing_violation(err)
}

#[cfg(windows)]
fn is_sharing_violation(err: &io::Error) -> bool {
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    matches!(err.raw_os_error(), Some(32) | Some(33))
}

#[cfg(not(windows))]
fn is_sharing_violation(_err: &io::Error) -> bool {
    false
}

/// QueueStorage は名前付きキューの item を管理する
///
/// # 設計原則
/// - すべて blocking（呼び出し側が spawn_blocking する）
/// - `relocate` / `relocate_as` は move。移動先に同名があれば上書きせず
///   `AlreadyExists` を返す（存在確認と移動の間の競合でも上書きしない）
/// - 移動先のキューは必要になった時点で作成する
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数 reader から共有できる）
pub trait QueueStorage: Send + Sync {
    /// キューを作成（既にあれば何もしない）
    fn ensure_queue(&self, queue: &str) -> Result<(), StorageError>;

    /// 取り出し候補の item を 1 つ返す（なければ None）
    fn first_item(&self, queue: &str) -> Result<Option<ItemName>, StorageError>;

    /// 全 item を名前順で返す
    fn list_items(&self, queue: &str) -> Result<Vec<ItemName>, StorageError>;

    /// item の中身を全部読む
    fn read_item(&self, queue: &str, item: &ItemName) -> Result<Vec<u8>, StorageError>;

    /// item を公開する（読み手から半端な状態は見えない）
    fn write_item(&self, queue: &str, item: &ItemName, bytes: &[u8]) -> Result<(), StorageError>;

    /// item を削除
    fn delete_item(&self, queue: &str, item: &ItemName) -> Result<(), StorageError>;

    /// item を別キューへ `target` という名前で移動
    ///
    /// `to/target` が既にあれば上書きせず `AlreadyExists`（`item` は元のまま）
    fn relocate_as(
        &self,
        from: &str,
        item: &ItemName,
        to: &str,
        target: &ItemName,
    ) -> Result<(), StorageError>;

    /// item を別キューへ同名で移動
    fn relocate(&self, from: &str, item: &ItemName, to: &str) -> Result<(), StorageError> {
        self.relocate_as(from, item, to, item)
    }
}
