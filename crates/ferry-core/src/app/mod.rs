//! App - アプリケーション層
//!
//! transport の core（QueueReader, quarantine）を組み合わせて
//! メッセージ処理ループを実装します。
//!
//! # 主要コンポーネント
//! - **MessageHandler**: アプリケーションの処理本体
//! - **Dispatcher**: 1 キュー分の poll → handle → ack / quarantine
//! - **DispatcherGroup**: キューごとのループを起動・停止

pub mod dispatcher;
pub mod group;
pub mod handler;

pub use self::dispatcher::{DrainStats, Dispatcher, PollReport};
pub use self::group::{DispatcherGroup, LoopSettings};
pub use self::handler::{HandlerError, MessageHandler};
