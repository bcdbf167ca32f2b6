//! # Processing Queue Module
//!
//! Single-flight FIFO queue for per-item extraction jobs.
//!
//! ## Item State Machine
//!
//! ```text
//! enqueue ──► QUEUED ──worker picks front──► IN_FLIGHT ──Ok──► COMPLETED (removed)
//!                ▲                               │
//!                │                               └──Err──► FAILED (parked)
//!                └────────────── retry(id) ◄─────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - One worker task drains the queue, so at most one job executes at a time
//! - Items are served in enqueue order
//! - A failed item leaves the queue immediately and is parked for manual retry
//! - A fixed cool-down separates the end of one job from the start of the next
//! - `clear()` drops every pending item and resets the in-flight flag without
//!   aborting the job that is currently executing
//!
//! Producers may enqueue from any thread; the queue state lock is the only
//! mutual-exclusion point.

use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{error_logging, AppError, AppResult};
use crate::extraction_errors::ExtractionError;

/// Boxed future returned by an extraction job
pub type JobFuture<R> = Pin<Box<dyn Future<Output = Result<R, ExtractionError>> + Send + 'static>>;

type SharedJob<P, R> = Arc<dyn Fn(P) -> JobFuture<R> + Send + Sync>;

/// Configuration for the processing queue
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Pause between the end of one job and the start of the next
    pub cooldown: Duration,
    /// Maximum number of queued (not yet started) items
    pub max_pending: usize,
    /// Maximum number of failed items kept for manual retry
    pub max_parked_failures: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(1000),
            max_pending: 500,
            max_parked_failures: 100,
        }
    }
}

impl QueueConfig {
    /// Validate queue configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.max_pending == 0 {
            return Err(AppError::Config(
                "max_pending must be greater than 0".to_string(),
            ));
        }
        if self.cooldown > Duration::from_secs(60) {
            return Err(AppError::Config(
                "cooldown cannot be greater than 60 seconds".to_string(),
            ));
        }
        Ok(())
    }
}

/// Observable state of an item known to the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Queued,
    InFlight,
    /// Failed and parked for manual retry, with the failure message
    Failed(String),
}

/// A unit of work owned by the queue
pub struct QueueItem<P, R> {
    pub id: String,
    pub payload: P,
    job: SharedJob<P, R>,
}

impl<P: Clone, R> Clone for QueueItem<P, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            payload: self.payload.clone(),
            job: Arc::clone(&self.job),
        }
    }
}

struct Pending<P, R> {
    item: QueueItem<P, R>,
    reply: oneshot::Sender<Result<R, ExtractionError>>,
}

struct QueueState<P, R> {
    pending: VecDeque<Pending<P, R>>,
    in_flight: Option<String>,
    failed: VecDeque<(QueueItem<P, R>, String)>,
    // Bumped by clear() so late results from a discarded generation are ignored
    epoch: u64,
}

impl<P, R> QueueState<P, R> {
    fn is_active(&self, id: &str) -> bool {
        self.in_flight.as_deref() == Some(id) || self.pending.iter().any(|p| p.item.id == id)
    }
}

struct QueueShared<P, R> {
    state: Mutex<QueueState<P, R>>,
    wake: Notify,
    shutdown: AtomicBool,
    config: QueueConfig,
}

/// Handle to the eventual result of an enqueued job
///
/// Dropping the ticket does not cancel the job.
pub struct JobTicket<R> {
    id: String,
    receiver: oneshot::Receiver<Result<R, ExtractionError>>,
}

impl<R> JobTicket<R> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the job outcome
    ///
    /// Items discarded by `clear()` before starting resolve to
    /// [`ExtractionError::Cancelled`].
    pub async fn wait(self) -> Result<R, ExtractionError> {
        let JobTicket { id, receiver } = self;
        match receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ExtractionError::Cancelled(id)),
        }
    }
}

/// Single-flight FIFO processing queue
///
/// Must be created inside a Tokio runtime; the worker task is spawned on
/// construction.
pub struct ProcessingQueue<P, R> {
    shared: Arc<QueueShared<P, R>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<P, R> ProcessingQueue<P, R>
where
    P: Clone + Send + 'static,
    R: Send + 'static,
{
    /// Create a queue and start its worker
    pub fn new(config: QueueConfig) -> Self {
        info!(
            cooldown_ms = config.cooldown.as_millis() as u64,
            max_pending = config.max_pending,
            "Creating ProcessingQueue"
        );
        let shared = Arc::new(QueueShared {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                in_flight: None,
                failed: VecDeque::new(),
                epoch: 0,
            }),
            wake: Notify::new(),
            shutdown: AtomicBool::new(false),
            config,
        });
        let worker = tokio::spawn(run_worker(Arc::clone(&shared)));
        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Append a job to the back of the queue
    ///
    /// Fails when an item with the same id is already queued or in flight, or
    /// when the queue is full. Re-enqueuing a parked failed id replaces it.
    pub fn enqueue<F, Fut>(
        &self,
        id: impl Into<String>,
        payload: P,
        job: F,
    ) -> AppResult<JobTicket<R>>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ExtractionError>> + Send + 'static,
    {
        let job: SharedJob<P, R> =
            Arc::new(move |payload: P| -> JobFuture<R> { Box::pin(job(payload)) });
        let item = QueueItem {
            id: id.into(),
            payload,
            job,
        };

        let mut state = self.shared.state.lock();
        let ticket = self.admit(&mut state, item)?;
        state.failed.retain(|(parked, _)| parked.id != ticket.id);
        drop(state);

        self.shared.wake.notify_one();
        Ok(ticket)
    }

    /// Re-append a parked failed item to the back of the queue
    pub fn retry(&self, id: &str) -> AppResult<JobTicket<R>> {
        let mut state = self.shared.state.lock();
        let position = state
            .failed
            .iter()
            .position(|(parked, _)| parked.id == id)
            .ok_or_else(|| AppError::Queue(format!("No failed item with id '{}'", id)))?;

        let item = state.failed[position].0.clone();
        let ticket = self.admit(&mut state, item)?;
        state.failed.remove(position);
        drop(state);

        info!(item_id = %id, "Retrying failed item");
        self.shared.wake.notify_one();
        Ok(ticket)
    }

    fn admit(
        &self,
        state: &mut QueueState<P, R>,
        item: QueueItem<P, R>,
    ) -> AppResult<JobTicket<R>> {
        if item.id.trim().is_empty() {
            return Err(AppError::Validation(
                "Queue item id cannot be empty".to_string(),
            ));
        }
        if state.is_active(&item.id) {
            return Err(AppError::Queue(format!(
                "Item '{}' is already queued or in flight",
                item.id
            )));
        }
        if state.pending.len() >= self.shared.config.max_pending {
            return Err(AppError::Queue(format!(
                "Queue is full ({} pending items)",
                state.pending.len()
            )));
        }

        let (reply, receiver) = oneshot::channel();
        let id = item.id.clone();
        state.pending.push_back(Pending { item, reply });
        gauge!("receipt_queue_depth").set(state.pending.len() as f64);
        debug!(item_id = %id, queue_length = state.pending.len(), "Enqueued item");

        Ok(JobTicket { id, receiver })
    }

    /// Restart draining when items are queued and nothing is in flight
    ///
    /// Returns true if draining was (re)started.
    pub fn manual_resume(&self) -> bool {
        {
            let state = self.shared.state.lock();
            if state.pending.is_empty() || state.in_flight.is_some() {
                return false;
            }
        }

        let mut worker = self.worker.lock();
        if worker.as_ref().map_or(true, |handle| handle.is_finished()) {
            warn!("Processing queue worker was not running, restarting it");
            *worker = Some(tokio::spawn(run_worker(Arc::clone(&self.shared))));
        }
        drop(worker);

        self.shared.wake.notify_one();
        true
    }

    /// Discard every pending item and reset in-flight state
    ///
    /// The currently executing job is not aborted; its result is still
    /// delivered to its own ticket. Returns the number of discarded items.
    pub fn clear(&self) -> usize {
        let mut state = self.shared.state.lock();
        let discarded = state.pending.len();
        state.pending.clear();
        state.failed.clear();
        state.in_flight = None;
        state.epoch += 1;
        gauge!("receipt_queue_depth").set(0.0);
        info!(discarded, "Cleared processing queue");
        discarded
    }

    /// Number of queued items not yet started
    pub fn queue_length(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Whether a job is currently in flight
    pub fn is_processing(&self) -> bool {
        self.shared.state.lock().in_flight.is_some()
    }

    /// State of an item, or `None` once it completed or was never seen
    pub fn status(&self, id: &str) -> Option<ItemState> {
        let state = self.shared.state.lock();
        if state.in_flight.as_deref() == Some(id) {
            return Some(ItemState::InFlight);
        }
        if state.pending.iter().any(|p| p.item.id == id) {
            return Some(ItemState::Queued);
        }
        state
            .failed
            .iter()
            .find(|(parked, _)| parked.id == id)
            .map(|(_, message)| ItemState::Failed(message.clone()))
    }

    /// Ids of failed items available for retry, oldest first
    pub fn failed_ids(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .failed
            .iter()
            .map(|(parked, _)| parked.id.clone())
            .collect()
    }
}

impl<P, R> Drop for ProcessingQueue<P, R> {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.wake.notify_one();
    }
}

impl<P, R> QueueShared<P, R> {
    fn take_next(&self) -> Option<(u64, Pending<P, R>)> {
        let mut state = self.state.lock();
        let next = state.pending.pop_front()?;
        state.in_flight = Some(next.item.id.clone());
        gauge!("receipt_queue_depth").set(state.pending.len() as f64);
        Some((state.epoch, next))
    }

    fn finish(
        &self,
        epoch: u64,
        item: QueueItem<P, R>,
        outcome: &Result<R, ExtractionError>,
        elapsed: Duration,
    ) {
        let mut state = self.state.lock();
        let current = state.epoch == epoch;
        if current {
            state.in_flight = None;
        }
        histogram!("receipt_queue_job_duration_seconds").record(elapsed.as_secs_f64());

        match outcome {
            Ok(_) => {
                counter!("receipt_queue_jobs_completed_total").increment(1);
                info!(
                    item_id = %item.id,
                    duration_ms = elapsed.as_millis() as u64,
                    queue_length = state.pending.len(),
                    "Extraction job completed"
                );
            }
            Err(e) => {
                counter!("receipt_queue_jobs_failed_total").increment(1);
                error_logging::log_extraction_error(
                    e,
                    &item.id,
                    Some(elapsed),
                    state.pending.len(),
                );
                if current {
                    state.failed.push_back((item, e.to_string()));
                    while state.failed.len() > self.config.max_parked_failures {
                        state.failed.pop_front();
                    }
                }
            }
        }
    }
}

async fn run_worker<P, R>(shared: Arc<QueueShared<P, R>>)
where
    P: Clone + Send + 'static,
    R: Send + 'static,
{
    debug!("Processing queue worker started");
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        let Some((epoch, Pending { item, reply })) = shared.take_next() else {
            shared.wake.notified().await;
            continue;
        };

        debug!(item_id = %item.id, "Starting extraction job");
        let started = Instant::now();
        let outcome = match tokio::spawn((item.job)(item.payload.clone())).await {
            Ok(result) => result,
            Err(join_error) => Err(ExtractionError::Panicked(join_error.to_string())),
        };

        shared.finish(epoch, item, &outcome, started.elapsed());
        if reply.send(outcome).is_err() {
            debug!("Job result dropped, ticket no longer awaited");
        }

        tokio::time::sleep(shared.config.cooldown).await;
    }
    debug!("Processing queue worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> QueueConfig {
        QueueConfig {
            cooldown: Duration::from_millis(5),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validation() {
        let mut config = QueueConfig::default();
        assert!(config.validate().is_ok());
        config.max_pending = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_completed_job_delivers_result() {
        let queue: ProcessingQueue<u32, u32> = ProcessingQueue::new(fast_config());
        let ticket = queue
            .enqueue("a", 21, |n| async move { Ok(n * 2) })
            .unwrap();
        assert_eq!(ticket.wait().await, Ok(42));
        assert_eq!(queue.status("a"), None);
    }

    #[tokio::test]
    async fn test_failed_job_is_parked() {
        let queue: ProcessingQueue<(), ()> = ProcessingQueue::new(fast_config());
        let ticket = queue
            .enqueue("bad", (), |_| async {
                Err(ExtractionError::Source("vision offline".to_string()))
            })
            .unwrap();
        assert!(matches!(ticket.wait().await, Err(ExtractionError::Source(_))));
        assert_eq!(queue.failed_ids(), vec!["bad".to_string()]);
        assert!(matches!(queue.status("bad"), Some(ItemState::Failed(_))));
    }

    #[tokio::test]
    async fn test_panicking_job_is_a_failure() {
        let queue: ProcessingQueue<(), ()> = ProcessingQueue::new(fast_config());
        let ticket = queue
            .enqueue("boom", (), |_| async {
                if true {
                    panic!("job exploded");
                }
                Ok(())
            })
            .unwrap();
        assert!(matches!(ticket.wait().await, Err(ExtractionError::Panicked(_))));

        let next = queue.enqueue("after", (), |_| async { Ok(()) }).unwrap();
        assert_eq!(next.wait().await, Ok(()));
    }

    #[tokio::test]
    async fn test_queue_capacity() {
        let config = QueueConfig {
            max_pending: 1,
            cooldown: Duration::from_millis(5),
            ..Default::default()
        };
        let queue: ProcessingQueue<(), ()> = ProcessingQueue::new(config);
        let gate = Arc::new(Notify::new());

        let blocker = Arc::clone(&gate);
        let first = queue
            .enqueue("first", (), move |_| {
                let blocker = Arc::clone(&blocker);
                async move {
                    blocker.notified().await;
                    Ok(())
                }
            })
            .unwrap();

        while !queue.is_processing() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let _second = queue.enqueue("second", (), |_| async { Ok(()) }).unwrap();
        let third = queue.enqueue("third", (), |_| async { Ok(()) });
        assert!(matches!(third, Err(AppError::Queue(_))));

        gate.notify_one();
        assert_eq!(first.wait().await, Ok(()));
    }

    #[tokio::test]
    async fn test_manual_resume_without_pending_items() {
        let queue: ProcessingQueue<(), ()> = ProcessingQueue::new(fast_config());
        assert!(!queue.manual_resume());
    }
}
