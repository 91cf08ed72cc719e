//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **FileSystemStorage**: ディレクトリベースのキュー（本番用）
//! - **InMemoryStorage**: 障害注入できるキュー（テスト用）
//! - **JsonEnvelopeCodec**: serde_json の codec
//! - **TracingObserver** / **RecordingObserver**: イベントの出力先

pub mod fs_storage;
pub mod inmem_storage;
pub mod json_codec;
pub mod observer;

pub use self::fs_storage::FileSystemStorage;
pub use self::inmem_storage::InMemoryStorage;
pub use self::json_codec::JsonEnvelopeCodec;
pub use self::observer::{RecordingObserver, TracingObserver};
