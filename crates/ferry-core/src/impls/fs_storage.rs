//! FileSystemStorage - ディレクトリを使ったキュー
//!
//! `root/<queue>/<item>` に 1 メッセージ 1 ファイルで保存します。
//! poison / dead-letter も `root` 直下の兄弟ディレクトリです。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::ItemName;
use crate::ports::{QueueStorage, StorageError};

/// FileSystemStorage は本番用の storage
///
/// # 実装詳細
/// - 公開は「隠しファイルに書く → hard link で公開名を作る → 隠しファイル削除」
/// - 移動は「hard link → 元を削除」。`fs::rename` は POSIX で移動先を黙って
///   置き換えるので使わない
/// - 移動先に同名があれば link が `AlreadyExists` で失敗し、何も上書きしない
/// - 元の削除に失敗したら作った link を消して元の状態に戻す
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn queue_dir(&self, queue: &str) -> PathBuf {
        self.root.join(queue)
    }

    fn item_path(&self, queue: &str, item: &ItemName) -> PathBuf {
        self.queue_dir(queue).join(item.as_str())
    }

    fn create_dir(&self, queue: &str) -> Result<PathBuf, StorageError> {
        let dir = self.queue_dir(queue);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(dir.display().to_string(), e))?;
        Ok(dir)
    }

    /// Visit every visible item of `queue` in directory order.
    fn scan(&self, queue: &str, mut visit: impl FnMut(ItemName)) -> Result<(), StorageError> {
        let dir = self.queue_dir(queue);
        let target = dir.display().to_string();
        let entries = fs::read_dir(&dir).map_err(|e| StorageError::io(&target, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&target, e))?;
            let file_type = entry.file_type().map_err(|e| StorageError::io(&target, e))?;
            if !file_type.is_file() {
                continue;
            }
            // Non UTF-8 names were not written by this transport.
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let item = ItemName::new(name);
            if !item.is_hidden() {
                visit(item);
            }
        }
        Ok(())
    }
}

/// Create `dst` as a second name for `src`; fails instead of replacing `dst`.
fn link_no_clobber(src: &Path, dst: &Path, queue: &str, item: &ItemName) -> Result<(), StorageError> {
    fs::hard_link(src, dst).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
            queue: queue.to_string(),
            item: item.clone(),
        },
        _ => StorageError::io(dst.display().to_string(), e),
    })
}

impl QueueStorage for FileSystemStorage {
    fn ensure_queue(&self, queue: &str) -> Result<(), StorageError> {
        self.create_dir(queue).map(|_| ())
    }

    fn first_item(&self, queue: &str) -> Result<Option<ItemName>, StorageError> {
        let mut first: Option<ItemName> = None;
        self.scan(queue, |item| {
            if first.as_ref().is_none_or(|current| item < *current) {
                first = Some(item);
            }
        })?;
        Ok(first)
    }

    fn list_items(&self, queue: &str) -> Result<Vec<ItemName>, StorageError> {
        let mut items = Vec::new();
        self.scan(queue, |item| items.push(item))?;
        items.sort();
        Ok(items)
    }

    fn read_item(&self, queue: &str, item: &ItemName) -> Result<Vec<u8>, StorageError> {
        fs::read(self.item_path(queue, item)).map_err(|e| StorageError::for_item(queue, item, e))
    }

    fn write_item(&self, queue: &str, item: &ItemName, bytes: &[u8]) -> Result<(), StorageError> {
        let dir = self.create_dir(queue)?;
        let staging = dir.join(format!(".{item}.tmp"));
        let published = fs::write(&staging, bytes)
            .map_err(|e| StorageError::io(staging.display().to_string(), e))
            .and_then(|()| link_no_clobber(&staging, &dir.join(item.as_str()), queue, item));

        // the staging file goes away whether or not the item was published
        if let Err(e) = fs::remove_file(&staging)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(queue, %item, error = %e, "failed to remove staging file");
        }
        published?;
        debug!(queue, %item, bytes = bytes.len(), "published item");
        Ok(())
    }

    fn delete_item(&self, queue: &str, item: &ItemName) -> Result<(), StorageError> {
        fs::remove_file(self.item_path(queue, item)).map_err(|e| StorageError::for_item(queue, item, e))
    }

    fn relocate_as(
        &self,
        from: &str,
        item: &ItemName,
        to: &str,
        target: &ItemName,
    ) -> Result<(), StorageError> {
        let source = self.item_path(from, item);
        if !source.try_exists().map_err(|e| StorageError::for_item(from, item, e))? {
            return Err(StorageError::NotFound {
                queue: from.to_string(),
                item: item.clone(),
            });
        }
        let destination = self.create_dir(to)?.join(target.as_str());
        link_no_clobber(&source, &destination, to, target)?;

        if let Err(e) = fs::remove_file(&source) {
            // undo the link so the item lives in exactly one place
            if let Err(undo) = fs::remove_file(&destination) {
                warn!(to, %target, error = %undo, "failed to undo relocation link");
            }
            return Err(StorageError::for_item(from, item, e));
        }
        debug!(from, to, %item, %target, "relocated item");
        Ok(())
    }
}
