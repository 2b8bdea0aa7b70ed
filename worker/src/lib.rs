//! The background verification worker.
//!
//! The verification engine runs inside a spawned task that communicates
//! with the foreground exclusively through typed messages: requests travel
//! over an mpsc mailbox with a oneshot reply channel per call, progress
//! events flow back on a dedicated FIFO stream. There is no shared mutable
//! state across the boundary.
//!
//! Cancellation is best-effort: `ClearVerification` (or a new `Verify` for
//! the same identifier) aborts the in-flight run, but fetches already in
//! progress finish on their own time.

use arvex_messages::{EventEnvelope, WorkerConfig, WorkerReply, WorkerRequest};
use arvex_types::Identifier;
use arvex_verification::{ContentFetcher, VerificationEngine, VerifyRequest};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// How long a request waits for its reply before giving up.
const ROUND_TRIP_TIMEOUT: Duration = Duration::from_secs(30);

/// Mailbox depth for requests and events.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker did not reply within {}s", ROUND_TRIP_TIMEOUT.as_secs())]
    Timeout,

    #[error("worker is not running")]
    ChannelClosed,
}

/// A request paired with its reply channel.
struct Correlated {
    request: WorkerRequest,
    reply: oneshot::Sender<WorkerReply>,
}

/// Foreground handle to the worker task.
///
/// Dropping the handle closes the mailbox, which ends the worker loop and
/// aborts any in-flight run.
pub struct WorkerHandle {
    requests: mpsc::Sender<Correlated>,
    events: Option<mpsc::Receiver<EventEnvelope>>,
}

impl WorkerHandle {
    /// Spawn the worker task around a content fetcher.
    pub fn spawn<F>(fetcher: F) -> Self
    where
        F: ContentFetcher + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let worker = Worker {
            engine: Arc::new(VerificationEngine::new(fetcher)),
            events: event_tx,
            config: WorkerConfig::default(),
            active: HashMap::new(),
            shutdown: false,
        };
        tokio::spawn(worker.run(request_rx));

        Self {
            requests: request_tx,
            events: Some(event_rx),
        }
    }

    /// Take the event stream. Yields `Some` exactly once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<EventEnvelope>> {
        self.events.take()
    }

    /// Whether the worker task is still accepting requests.
    pub fn is_alive(&self) -> bool {
        !self.requests.is_closed()
    }

    /// Send a request and await its reply, bounded by the round-trip
    /// timeout.
    pub async fn request(&self, request: WorkerRequest) -> Result<WorkerReply, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(Correlated {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;

        match tokio::time::timeout(ROUND_TRIP_TIMEOUT, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(WorkerError::ChannelClosed),
            Err(_) => Err(WorkerError::Timeout),
        }
    }
}

/// The worker task state.
struct Worker<F> {
    engine: Arc<VerificationEngine<F>>,
    events: mpsc::Sender<EventEnvelope>,
    config: WorkerConfig,
    /// In-flight runs, at most one per identifier.
    active: HashMap<Identifier, JoinHandle<()>>,
    shutdown: bool,
}

impl<F: ContentFetcher + 'static> Worker<F> {
    async fn run(mut self, mut requests: mpsc::Receiver<Correlated>) {
        while let Some(Correlated { request, reply }) = requests.recv().await {
            let response = self.handle(request);
            // A dropped reply receiver means the caller timed out; the
            // request itself has already been applied.
            let _ = reply.send(response);
            if self.shutdown {
                break;
            }
        }
        self.abort_all();
        tracing::debug!("verification worker stopped");
    }

    fn handle(&mut self, request: WorkerRequest) -> WorkerReply {
        match request {
            WorkerRequest::Init { config } => {
                if config.trusted_gateway_count == 0 {
                    return WorkerReply::Rejected {
                        reason: "trusted_gateway_count must be at least 1".into(),
                    };
                }
                tracing::debug!(?config, "worker configured");
                self.config = config;
                WorkerReply::Ack
            }
            WorkerRequest::ClearCache => {
                self.engine.clear_memo();
                WorkerReply::Ack
            }
            WorkerRequest::ClearVerification { identifier } => {
                if let Some(handle) = self.active.remove(&identifier) {
                    handle.abort();
                    tracing::debug!(identifier = %identifier, "aborted verification run");
                }
                WorkerReply::Ack
            }
            WorkerRequest::Verify {
                generation,
                identifier,
                gateway,
                trusted_gateways,
            } => {
                // A new run for the same identifier supersedes the old one.
                if let Some(stale) = self.active.remove(&identifier) {
                    stale.abort();
                }

                let request = VerifyRequest {
                    generation,
                    identifier: identifier.clone(),
                    gateway,
                    trusted_gateways,
                    config: self.config.clone(),
                };
                let engine = Arc::clone(&self.engine);
                let events = self.events.clone();
                let handle = tokio::spawn(async move {
                    engine.run(request, events).await;
                });
                self.active.insert(identifier, handle);
                WorkerReply::Ack
            }
            WorkerRequest::Shutdown => {
                self.shutdown = true;
                WorkerReply::Ack
            }
        }
    }

    fn abort_all(&mut self) {
        for (_, handle) in self.active.drain() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
