//! In-process progress hub.
//!
//! [`ProgressHub`] receives [`ProgressUpdate`]s from job workers through
//! a bounded queue, throttles them per job, stamps every emitted update
//! with a monotonic sequence number and an epoch-millisecond timestamp,
//! keeps the result in a [`ReplayBuffer`], and broadcasts it to all
//! subscribers.
//!
//! Two background tasks do the work: the sender loop drains the queue
//! and the flusher periodically emits coalesced updates. Both stop when
//! [`ProgressHub::shutdown`] cancels the hub's token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pictopy_core::progress::{ProgressMessage, ProgressUpdate};
use pictopy_core::reconcile::{Job, ProgressReconciler};
use pictopy_core::types::{now_millis, Seq};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::HubConfig;
use crate::replay::ReplayBuffer;
use crate::throttle::Throttle;

/// Errors returned to a producer whose update was not queued.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The update carried no job id.
    #[error("Progress update has no job id")]
    MissingJobId,

    /// The inbound queue is full; the update was dropped.
    #[error("Progress queue is full, update for job {0} dropped")]
    QueueFull(String),

    /// The hub has been shut down.
    #[error("Progress hub is not running")]
    NotRunning,
}

/// Point-in-time hub counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Updates dropped because the queue was full or the hub stopped.
    pub dropped: u64,
    /// Events currently held for replay.
    pub buffered: usize,
    /// Last sequence number assigned (0 before the first emission).
    pub last_seq: Seq,
}

/// Everything derived from emitted events.
struct Emitted {
    replay: ReplayBuffer,
    /// Latest state per job, for clients that need a starting snapshot.
    board: ProgressReconciler,
}

/// State shared between the hub handle and its background tasks.
struct HubShared {
    seq: AtomicU64,
    dropped: AtomicU64,
    emitted: RwLock<Emitted>,
    throttle: Mutex<Throttle>,
    events_tx: broadcast::Sender<ProgressMessage>,
}

impl HubShared {
    /// Stamp, record, and broadcast one update.
    ///
    /// The emitted-state lock is held across seq assignment and broadcast
    /// so that buffer order, broadcast order, and seq order agree.
    async fn emit(&self, update: ProgressUpdate) -> ProgressMessage {
        let mut emitted = self.emitted.write().await;
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let message = ProgressMessage {
            seq: Some(seq),
            ts: Some(now_millis()),
            payload: update,
        };
        emitted.board.apply(&message);
        emitted.replay.push(message.clone());
        // A send error only means there are no subscribers right now.
        let _ = self.events_tx.send(message.clone());
        tracing::trace!(
            seq,
            job_id = message.payload.job_id.as_deref().unwrap_or_default(),
            "Progress event emitted",
        );
        message
    }
}

/// Cheap, cloneable handle for submitting updates.
///
/// Safe to call from any thread, including blocking worker threads;
/// [`publish`](Self::publish) never waits.
#[derive(Clone)]
pub struct ProgressPublisher {
    queue_tx: mpsc::Sender<ProgressUpdate>,
    shared: Arc<HubShared>,
}

impl ProgressPublisher {
    /// Queue an update for emission.
    ///
    /// Dropped updates are counted in [`HubStats::dropped`].
    pub fn publish(&self, update: ProgressUpdate) -> Result<(), PublishError> {
        let Some(job_id) = update.job_id().map(str::to_string) else {
            return Err(PublishError::MissingJobId);
        };
        self.queue_tx.try_send(update).map_err(|e| {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            match e {
                mpsc::error::TrySendError::Full(_) => PublishError::QueueFull(job_id),
                mpsc::error::TrySendError::Closed(_) => PublishError::NotRunning,
            }
        })
    }
}

/// Orchestrates progress emission for the whole process.
///
/// Created once at startup via [`ProgressHub::start`]; the returned
/// `Arc` can be cloned into request handlers and workers.
pub struct ProgressHub {
    publisher: ProgressPublisher,
    shared: Arc<HubShared>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ProgressHub {
    /// Create the hub and spawn its sender and flusher tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: HubConfig) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (events_tx, _) = broadcast::channel(config.broadcast_capacity.max(1));
        let cancel = CancellationToken::new();

        let shared = Arc::new(HubShared {
            seq: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            emitted: RwLock::new(Emitted {
                replay: ReplayBuffer::new(config.recent_max),
                board: ProgressReconciler::new(),
            }),
            throttle: Mutex::new(Throttle::from_config(&config)),
            events_tx,
        });

        let sender = tokio::spawn(sender_loop(queue_rx, Arc::clone(&shared), cancel.clone()));
        let flusher = tokio::spawn(flusher_loop(
            config.flush_interval,
            Arc::clone(&shared),
            cancel.clone(),
        ));

        tracing::info!(
            queue_capacity = config.queue_capacity,
            recent_max = config.recent_max,
            flush_interval_ms = config.flush_interval.as_millis() as u64,
            "Progress hub started",
        );

        Arc::new(Self {
            publisher: ProgressPublisher {
                queue_tx,
                shared: Arc::clone(&shared),
            },
            shared,
            cancel,
            tasks: Mutex::new(vec![sender, flusher]),
        })
    }

    /// A handle workers can hold to publish updates.
    pub fn publisher(&self) -> ProgressPublisher {
        self.publisher.clone()
    }

    /// Shorthand for `self.publisher().publish(update)`.
    pub fn publish(&self, update: ProgressUpdate) -> Result<(), PublishError> {
        self.publisher.publish(update)
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressMessage> {
        self.shared.events_tx.subscribe()
    }

    /// Buffered events with `seq > since` (all when `since` is `None`).
    pub async fn events_since(&self, since: Option<Seq>) -> Vec<ProgressMessage> {
        self.shared.emitted.read().await.replay.since(since)
    }

    /// Latest emitted state of every job, ordered by id.
    pub async fn jobs(&self) -> Vec<Job> {
        self.shared.emitted.read().await.board.snapshot()
    }

    /// Latest emitted state of one job.
    pub async fn job(&self, job_id: &str) -> Option<Job> {
        self.shared.emitted.read().await.board.job(job_id).cloned()
    }

    pub async fn stats(&self) -> HubStats {
        let buffered = self.shared.emitted.read().await.replay.len();
        HubStats {
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            buffered,
            last_seq: self.shared.seq.load(Ordering::SeqCst),
        }
    }

    /// Stop the background tasks.
    ///
    /// Waits up to 5 seconds per task. Updates still queued or pending
    /// are discarded; later `publish` calls fail with
    /// [`PublishError::NotRunning`].
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down progress hub");
        self.cancel.cancel();

        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }

        tracing::info!("Progress hub shut down complete");
    }
}

/// Drain the inbound queue, emitting or coalescing each update.
async fn sender_loop(
    mut queue_rx: mpsc::Receiver<ProgressUpdate>,
    shared: Arc<HubShared>,
    cancel: CancellationToken,
) {
    loop {
        let update = tokio::select! {
            _ = cancel.cancelled() => break,
            next = queue_rx.recv() => match next {
                Some(update) => update,
                None => break,
            },
        };

        // The throttle lock is held through emission so a concurrent flush
        // cannot emit an older pending value after this one.
        let mut throttle = shared.throttle.lock().await;
        if let Some(update) = throttle.offer(update, Instant::now()) {
            shared.emit(update).await;
        }
    }
    tracing::debug!("Progress sender loop exited");
}

/// Periodically emit coalesced updates.
async fn flusher_loop(period: Duration, shared: Arc<HubShared>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let mut throttle = shared.throttle.lock().await;
        let pending = throttle.take_pending(Instant::now());
        if pending.is_empty() {
            continue;
        }
        tracing::debug!(count = pending.len(), "Flushing coalesced progress updates");
        for update in pending {
            shared.emit(update).await;
        }
        drop(throttle);
    }
    tracing::debug!("Progress flusher loop exited");
}
