//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! transport の core（QueueReader, quarantine）は外部にある
//! storage・codec・observer をこの trait 経由でのみ使います。

pub mod clock;
pub mod codec;
pub mod id_generator;
pub mod observer;
pub mod storage;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::codec::{CodecError, EnvelopeCodec};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::observer::{NullObserver, SystemObserver};
pub use self::storage::{QueueStorage, StorageError};
