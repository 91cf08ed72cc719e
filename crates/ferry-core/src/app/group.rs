use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{Dispatcher, PollReport};

/// Poll cadence of a dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Pause after an empty poll, a deferred message or a reader retry.
    pub poll_interval: Duration,
    /// Pause after a queue-level error.
    pub error_backoff: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Dispatch loop handle.
/// - one loop per dispatcher (one polling sequence per queue)
/// - `request_shutdown()` (or dropping the group) stops polling; in-flight
///   handlers run to completion
/// - `shutdown_and_join()` waits for every loop to exit
pub struct DispatcherGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl DispatcherGroup {
    pub fn spawn(dispatchers: Vec<Dispatcher>, settings: LoopSettings) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let joins = dispatchers
            .into_iter()
            .map(|dispatcher| {
                let dispatcher = Arc::new(dispatcher);
                let mut rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    dispatch_loop(dispatcher, settings, &mut rx).await;
                })
            })
            .collect();

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                error!("dispatch loop panicked: {e}");
            }
        }
    }
}

async fn dispatch_loop(
    dispatcher: Arc<Dispatcher>,
    settings: LoopSettings,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    info!(queue = dispatcher.queue(), "dispatch loop started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let pause = match dispatcher.poll_once().await {
            Ok(PollReport::Processed | PollReport::Abandoned) => None,
            Ok(PollReport::Idle | PollReport::Deferred | PollReport::Retry) => {
                Some(settings.poll_interval)
            }
            Ok(PollReport::Error) => Some(settings.error_backoff),
            Err(e) => {
                error!(queue = dispatcher.queue(), "poll failed: {e}");
                Some(settings.error_backoff)
            }
        };

        if let Some(pause) = pause {
            // wake early on shutdown; a dropped sender also stops the loop
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
    info!(queue = dispatcher.queue(), "dispatch loop stopped");
}
