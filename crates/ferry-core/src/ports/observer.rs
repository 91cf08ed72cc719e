//! SystemObserver port - 障害イベントの通知先
//!
//! # 実装
//! - **TracingObserver**: tracing にログ出力（本番用）
//! - **RecordingObserver**: イベントを溜める（テスト用）
//! - **NullObserver**: 何もしない

use crate::domain::SystemEvent;

/// SystemObserver はイベントを受け取るだけの sink
///
/// fire-and-forget: 戻り値はなく、通知の失敗は呼び出し側に伝わりません。
pub trait SystemObserver: Send + Sync {
    fn notify(&self, event: SystemEvent);
}

/// NullObserver はイベントを捨てる
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl SystemObserver for NullObserver {
    fn notify(&self, _event: SystemEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn null_observer_is_usable_as_a_shared_sink() {
        let observer: Arc<dyn SystemObserver> = Arc::new(NullObserver);
        observer.notify(SystemEvent::FailedToReadMessage {
            queue: "inbox".to_string(),
            cause: "ignored".to_string(),
        });
    }
}
