//! InMemoryStorage - テスト用の storage
//!
//! # 学習ポイント
//! - Mutex で全キューをまとめて排他制御
//! - 障害注入（busy / 読み込み失敗 / 列挙失敗）でタイミングに依存しないテスト

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::ItemName;
use crate::ports::{QueueStorage, StorageError};

type ItemKey = (String, ItemName);

#[derive(Default)]
struct InMemoryState {
    /// queue 名ごとの item（名前順）
    queues: HashMap<String, BTreeMap<ItemName, Vec<u8>>>,
    /// 他プロセスが掴んでいる扱いの item
    busy: HashSet<ItemKey>,
    /// 読み込み時に返すエラー
    read_failures: HashMap<ItemKey, io::ErrorKind>,
    /// 列挙が失敗するキュー
    failing_listings: HashSet<String>,
    /// 移動先として使えないキュー
    failing_relocations: HashSet<String>,
}

impl InMemoryState {
    fn queue(&self, queue: &str) -> Result<&BTreeMap<ItemName, Vec<u8>>, StorageError> {
        if self.failing_listings.contains(queue) {
            return Err(StorageError::io(
                queue,
                io::Error::other("simulated listing failure"),
            ));
        }
        self.queues
            .get(queue)
            .ok_or_else(|| StorageError::io(queue, io::Error::from(io::ErrorKind::NotFound)))
    }

    fn not_found(queue: &str, item: &ItemName) -> StorageError {
        StorageError::NotFound {
            queue: queue.to_string(),
            item: item.clone(),
        }
    }
}

/// InMemoryStorage は開発・テスト用の storage
///
/// FileSystemStorage と同じ規約（列挙は名前順、移動は上書きしない、
/// 移動先は自動作成）に従います。
#[derive(Default)]
pub struct InMemoryStorage {
    state: Mutex<InMemoryState>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// item を busy（他プロセスがロック中）にする / 解除する
    pub fn set_busy(&self, queue: &str, item: &ItemName, busy: bool) {
        let key = (queue.to_string(), item.clone());
        let mut state = self.state();
        if busy {
            state.busy.insert(key);
        } else {
            state.busy.remove(&key);
        }
    }

    /// item の読み込みを `kind` で失敗させる
    pub fn fail_reads(&self, queue: &str, item: &ItemName, kind: io::ErrorKind) {
        self.state()
            .read_failures
            .insert((queue.to_string(), item.clone()), kind);
    }

    /// キューの列挙を失敗させる / 元に戻す
    pub fn fail_listing(&self, queue: &str, failing: bool) {
        let mut state = self.state();
        if failing {
            state.failing_listings.insert(queue.to_string());
        } else {
            state.failing_listings.remove(queue);
        }
    }

    /// `to` への移動を失敗させる / 元に戻す
    pub fn fail_relocations_to(&self, to: &str, failing: bool) {
        let mut state = self.state();
        if failing {
            state.failing_relocations.insert(to.to_string());
        } else {
            state.failing_relocations.remove(to);
        }
    }

    pub fn contains(&self, queue: &str, item: &ItemName) -> bool {
        self.state()
            .queues
            .get(queue)
            .is_some_and(|items| items.contains_key(item))
    }

    pub fn queue_exists(&self, queue: &str) -> bool {
        self.state().queues.contains_key(queue)
    }
}

impl QueueStorage for InMemoryStorage {
    fn ensure_queue(&self, queue: &str) -> Result<(), StorageError> {
        self.state().queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    fn first_item(&self, queue: &str) -> Result<Option<ItemName>, StorageError> {
        let state = self.state();
        Ok(state.queue(queue)?.keys().next().cloned())
    }

    fn list_items(&self, queue: &str) -> Result<Vec<ItemName>, StorageError> {
        let state = self.state();
        Ok(state.queue(queue)?.keys().cloned().collect())
    }

    fn read_item(&self, queue: &str, item: &ItemName) -> Result<Vec<u8>, StorageError> {
        let state = self.state();
        let key = (queue.to_string(), item.clone());
        if state.busy.contains(&key) {
            return Err(StorageError::for_item(
                queue,
                item,
                io::Error::new(io::ErrorKind::ResourceBusy, "simulated lock"),
            ));
        }
        if let Some(kind) = state.read_failures.get(&key) {
            return Err(StorageError::for_item(
                queue,
                item,
                io::Error::new(*kind, "simulated read failure"),
            ));
        }
        state
            .queues
            .get(queue)
            .and_then(|items| items.get(item))
            .cloned()
            .ok_or_else(|| InMemoryState::not_found(queue, item))
    }

    fn write_item(&self, queue: &str, item: &ItemName, bytes: &[u8]) -> Result<(), StorageError> {
        let mut state = self.state();
        let items = state.queues.entry(queue.to_string()).or_default();
        if items.contains_key(item) {
            return Err(StorageError::AlreadyExists {
                queue: queue.to_string(),
                item: item.clone(),
            });
        }
        items.insert(item.clone(), bytes.to_vec());
        Ok(())
    }

    fn delete_item(&self, queue: &str, item: &ItemName) -> Result<(), StorageError> {
        self.state()
            .queues
            .get_mut(queue)
            .and_then(|items| items.remove(item))
            .map(|_| ())
            .ok_or_else(|| InMemoryState::not_found(queue, item))
    }

    fn relocate_as(
        &self,
        from: &str,
        item: &ItemName,
        to: &str,
        target: &ItemName,
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        if state.failing_relocations.contains(to) {
            return Err(StorageError::io(
                to,
                io::Error::other("simulated relocation failure"),
            ));
        }
        if state
            .queues
            .get(to)
            .is_some_and(|items| items.contains_key(target))
        {
            return Err(StorageError::AlreadyExists {
                queue: to.to_string(),
                item: target.clone(),
            });
        }
        let bytes = state
            .queues
            .get_mut(from)
            .and_then(|items| items.remove(item))
            .ok_or_else(|| InMemoryState::not_found(from, item))?;
        state
            .queues
            .entry(to.to_string())
            .or_default()
            .insert(target.clone(), bytes);
        Ok(())
    }
}
