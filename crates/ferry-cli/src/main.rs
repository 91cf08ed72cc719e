use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ferry_core::FerryConfig;
use ferry_core::app::{Dispatcher, DispatcherGroup, HandlerError, LoopSettings, MessageHandler};
use ferry_core::domain::Envelope;
use ferry_core::impls::{FileSystemStorage, JsonEnvelopeCodec, TracingObserver};
use ferry_core::ports::{EnvelopeCodec, QueueStorage, SystemObserver};
use ferry_core::quarantine::{EnvelopeQuarantine, MemoryQuarantine};
use ferry_core::transport::{QueueReader, QueueWriter};

#[derive(Debug, Parser)]
#[command(name = "ferry", version, about = "Directory-backed message queue")]
struct Cli {
    /// TOML config file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Overrides `root` from the config
    #[arg(long)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Publish one message
    Send {
        #[arg(long, short)]
        queue: String,
        /// JSON payload
        #[arg(long, short)]
        payload: String,
    },
    /// Process messages, printing each payload as one JSON line
    Consume {
        /// Queues to consume (default: every configured queue)
        #[arg(long, short)]
        queue: Vec<String>,
        /// Drain the queues once and exit
        #[arg(long)]
        once: bool,
        #[arg(long, default_value_t = 10_000)]
        max_polls: usize,
    },
    /// Show pending, poison and dead-letter counts
    Inspect,
    /// Move dead-lettered items back into their queue
    Replay {
        #[arg(long, short)]
        queue: String,
    },
}

/// Prints each payload to stdout.
struct PrintHandler;

#[async_trait]
impl MessageHandler for PrintHandler {
    async fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        let line = serde_json::to_string(envelope.payload())
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))?;
        println!("{line}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry=info,ferry_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => FerryConfig::load(path)?,
        None => FerryConfig::default(),
    };
    if let Some(root) = cli.root {
        config.root = root;
    }

    let storage: Arc<dyn QueueStorage> = Arc::new(FileSystemStorage::new(&config.root));
    let codec: Arc<dyn EnvelopeCodec> = Arc::new(JsonEnvelopeCodec);

    match cli.command {
        Command::Send { queue, payload } => {
            let payload: serde_json::Value = serde_json::from_str(&payload)?;
            let writer = QueueWriter::new(queue, storage, codec);
            let envelope = writer.compose(payload);
            let item = writer.send(&envelope)?;
            tracing::info!(queue = writer.queue(), %item, envelope_id = %envelope.envelope_id(), "sent");
        }
        Command::Consume {
            queue,
            once,
            max_polls,
        } => {
            let queues = if queue.is_empty() { config.queues.clone() } else { queue };
            let observer: Arc<dyn SystemObserver> = Arc::new(TracingObserver);
            let quarantine: Arc<dyn EnvelopeQuarantine> =
                Arc::new(MemoryQuarantine::new(config.quarantine_policy()));
            let handler: Arc<dyn MessageHandler> = Arc::new(PrintHandler);

            let mut dispatchers = Vec::with_capacity(queues.len());
            for name in &queues {
                let reader = QueueReader::new(
                    config.layout(name),
                    Arc::clone(&storage),
                    Arc::clone(&codec),
                    Arc::clone(&observer),
                );
                reader.initialize()?;
                dispatchers.push(Dispatcher::new(
                    Arc::new(reader),
                    Arc::clone(&handler),
                    Arc::clone(&quarantine),
                ));
            }

            if once {
                for dispatcher in &dispatchers {
                    let stats = dispatcher.drain(max_polls).await?;
                    tracing::info!(
                        queue = dispatcher.queue(),
                        processed = stats.processed,
                        deferred = stats.deferred,
                        abandoned = stats.abandoned,
                        retried = stats.retried,
                        "drained"
                    );
                }
            } else {
                let settings = LoopSettings {
                    poll_interval: config.poll_interval(),
                    error_backoff: config.error_backoff(),
                };
                let group = DispatcherGroup::spawn(dispatchers, settings);
                tracing::info!(queues = group.len(), root = %config.root.display(), "consuming, ctrl-c to stop");
                tokio::signal::ctrl_c().await?;
                group.shutdown_and_join().await;
            }
        }
        Command::Inspect => {
            for layout in config.layouts() {
                let count = |name: &str| storage.list_items(name).map(|items| items.len()).unwrap_or(0);
                println!(
                    "{}\tpending={}\tpoison={}\tdead={}",
                    layout.queue,
                    count(&layout.queue),
                    count(&layout.poison),
                    count(&layout.dead_letter),
                );
            }
        }
        Command::Replay { queue } => {
            let layout = config.layout(&queue);
            let items = match storage.list_items(&layout.dead_letter) {
                Ok(items) => items,
                Err(e) => {
                    tracing::info!(queue = %layout.queue, "nothing to replay: {e}");
                    return Ok(());
                }
            };
            storage.ensure_queue(&layout.queue)?;
            for item in &items {
                storage.relocate(&layout.dead_letter, item, &layout.queue)?;
            }
            tracing::info!(queue = %layout.queue, replayed = items.len(), "replayed dead letters");
        }
    }
    Ok(())
}
