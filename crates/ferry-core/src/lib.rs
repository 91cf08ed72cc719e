//! ferry-core
//!
//! At-least-once message transport over a directory-backed queue.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, envelope, transport context, poll outcome, events）
//! - **ports**: 抽象化レイヤー（QueueStorage, EnvelopeCodec, SystemObserver, Clock, IdGenerator）
//! - **impls**: 実装（FileSystemStorage, InMemoryStorage, JsonEnvelopeCodec, observers）
//! - **quarantine**: リトライ回数の上限管理（MemoryQuarantine）
//! - **transport**: QueueReader / QueueWriter
//! - **app**: 処理ループ（Dispatcher, DispatcherGroup）
//! - **config**: TOML 設定

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod quarantine;
pub mod transport;

pub use crate::config::{ConfigError, FerryConfig};
pub use crate::error::FerryError;
