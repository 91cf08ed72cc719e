//! Dispatcher - poll → handle → ack / quarantine
//!
//! # フロー
//! 1. QueueReader::try_get_message()（blocking なので spawn_blocking）
//! 2. MessageHandler::handle()
//! 3. 成功: ack してから quarantine を release
//! 4. 失敗: quarantine に報告。上限に達したら dead-letter へ移動、
//!    そうでなければ item はそのまま（次の poll で再配送）
//! 5. dead-letter への移動が失敗した envelope は覚えておき、次の poll では
//!    handler を呼ばずに移動だけをやり直す（quarantine の counter は既に消えている）

use std::sync::Arc;

use dashmap::DashSet;
use tracing::{debug, warn};

use super::MessageHandler;
use crate::domain::{EnvelopeId, GetMessageResult, TransportContext};
use crate::error::FerryError;
use crate::quarantine::EnvelopeQuarantine;
use crate::transport::QueueReader;

/// What one poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollReport {
    /// Queue was empty.
    Idle,
    /// Handler succeeded and the item was acked.
    Processed,
    /// Handler failed; the item stays pending for another attempt.
    Deferred,
    /// Handler failed for the last time; the item was dead-lettered.
    Abandoned,
    /// Reader asked for another poll (busy, unreadable or poisoned item).
    Retry,
    /// Reader hit a queue-level failure.
    Error,
}

/// Counters collected by `Dispatcher::drain`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub polls: usize,
    pub processed: usize,
    pub deferred: usize,
    pub abandoned: usize,
    pub retried: usize,
}

/// Runs handlers for one queue.
pub struct Dispatcher {
    reader: Arc<QueueReader>,
    handler: Arc<dyn MessageHandler>,
    quarantine: Arc<dyn EnvelopeQuarantine>,
    /// Abandoned envelopes whose dead-letter move has not succeeded yet.
    abandoned: DashSet<EnvelopeId>,
}

impl Dispatcher {
    pub fn new(
        reader: Arc<QueueReader>,
        handler: Arc<dyn MessageHandler>,
        quarantine: Arc<dyn EnvelopeQuarantine>,
    ) -> Self {
        Self {
            reader,
            handler,
            quarantine,
            abandoned: DashSet::new(),
        }
    }

    pub fn queue(&self) -> &str {
        self.reader.name()
    }

    /// Run a blocking reader operation off the async worker threads.
    async fn with_reader<T, F>(&self, f: F) -> Result<T, FerryError>
    where
        T: Send + 'static,
        F: FnOnce(&QueueReader) -> T + Send + 'static,
    {
        let reader = Arc::clone(&self.reader);
        Ok(tokio::task::spawn_blocking(move || f(reader.as_ref())).await?)
    }

    /// Poll once and process at most one message.
    pub async fn poll_once(&self) -> Result<PollReport, FerryError> {
        let result = self.with_reader(|reader| reader.try_get_message()).await?;
        let context = match result {
            GetMessageResult::Empty => return Ok(PollReport::Idle),
            GetMessageResult::Retry => return Ok(PollReport::Retry),
            GetMessageResult::Error => return Ok(PollReport::Error),
            GetMessageResult::Success(context) => context,
        };

        if self.abandoned.contains(context.envelope().envelope_id()) {
            return self.abandon(context).await;
        }

        let envelope = context.envelope().clone();
        match self.handler.handle(&envelope).await {
            Ok(()) => {
                // ack first: a crash before this line redelivers the message
                self.with_reader(move |reader| reader.ack_message(context))
                    .await??;
                self.quarantine.try_release(Some(&envelope));
                Ok(PollReport::Processed)
            }
            Err(err) => {
                let cause = err.to_string();
                if self.quarantine.try_to_quarantine(Some(&envelope), &cause) {
                    self.abandon(context).await
                } else {
                    debug!(
                        queue = self.queue(),
                        envelope_id = %envelope.envelope_id(),
                        %cause,
                        "handler failed, message stays pending"
                    );
                    Ok(PollReport::Deferred)
                }
            }
        }
    }

    async fn abandon(&self, context: TransportContext) -> Result<PollReport, FerryError> {
        let envelope_id = context.envelope().envelope_id().clone();
        match self.with_reader(move |reader| reader.dead_letter(context)).await? {
            Ok(()) => {
                self.abandoned.remove(&envelope_id);
                Ok(PollReport::Abandoned)
            }
            Err(err) => {
                warn!(
                    queue = self.queue(),
                    %envelope_id,
                    error = %err,
                    "dead-letter failed, will retry the move without handling"
                );
                self.abandoned.insert(envelope_id);
                Err(err)
            }
        }
    }

    /// Poll until the queue is empty, a queue-level error occurs, or
    /// `max_polls` is reached.
    pub async fn drain(&self, max_polls: usize) -> Result<DrainStats, FerryError> {
        let mut stats = DrainStats::default();
        while stats.polls < max_polls {
            stats.polls += 1;
            match self.poll_once().await? {
                PollReport::Idle => break,
                PollReport::Error => {
                    warn!(queue = self.queue(), "queue error, stopping drain");
                    break;
                }
                PollReport::Processed => stats.processed += 1,
                PollReport::Deferred => stats.deferred += 1,
                PollReport::Abandoned => stats.abandoned += 1,
                PollReport::Retry => stats.retried += 1,
            }
        }
        Ok(stats)
    }
}
