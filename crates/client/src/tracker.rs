//! Buffered view reporting.
//!
//! [`ViewTracker`] queues views in memory and ships them to the batch endpoint
//! from one background task. Views are delayed by `flush_delay` so bursts
//! coalesce into a single request; while the queue stays non-empty the next
//! flush follows after `retry_delay`.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use hololith_core::analytics::{VIEWER_ID_MAX_LEN, VIEWER_ID_MIN_LEN};
use hololith_core::{ViewEventInput, ViewTarget};

use crate::{Error, HololithClient};

/// Largest batch the server accepts.
pub const MAX_BATCH_SIZE: usize = 50;

/// Destination for batches of views.
#[async_trait]
pub trait ViewSink: Send + Sync + 'static {
    /// Deliver one batch. Returns how many events were accepted.
    async fn send_batch(&self, events: &[ViewEventInput]) -> Result<usize, Error>;
}

#[async_trait]
impl ViewSink for HololithClient {
    async fn send_batch(&self, events: &[ViewEventInput]) -> Result<usize, Error> {
        self.track_batch(events).await
    }
}

/// Tuning for a [`ViewTracker`].
#[derive(Debug, Clone)]
pub struct ViewTrackerConfig {
    /// Queue capacity. When full, the oldest queued view is dropped.
    pub max_queue: usize,
    /// Delay between the first queued view and the flush that sends it.
    pub flush_delay: Duration,
    /// Delay between flushes while views remain queued.
    pub retry_delay: Duration,
    /// Views per request, at most [`MAX_BATCH_SIZE`].
    pub batch_size: usize,
    /// Consecutive failed deliveries after which a batch is dropped.
    pub max_retries: u32,
    /// Fixed viewer id. Generated when `None`.
    pub viewer_id: Option<String>,
    /// File that keeps a generated viewer id across runs.
    pub viewer_id_path: Option<PathBuf>,
}

impl Default for ViewTrackerConfig {
    fn default() -> Self {
        Self {
            max_queue: 1000,
            flush_delay: Duration::from_secs(5),
            retry_delay: Duration::from_millis(1500),
            batch_size: MAX_BATCH_SIZE,
            max_retries: 5,
            viewer_id: None,
            viewer_id_path: None,
        }
    }
}

struct Shared {
    config: ViewTrackerConfig,
    queue: Mutex<VecDeque<ViewEventInput>>,
    wake: Notify,
}

impl Shared {
    fn push(&self, event: ViewEventInput) {
        let mut queue = self.queue.lock();
        if queue.len() >= self.config.max_queue {
            queue.pop_front();
            warn!(max_queue = self.config.max_queue, "view queue full, dropping oldest view");
        }
        queue.push_back(event);
    }

    fn take_batch(&self) -> Vec<ViewEventInput> {
        let mut queue = self.queue.lock();
        let n = queue.len().min(self.config.batch_size);
        queue.drain(..n).collect()
    }

    /// Put a failed batch back at the front, keeping its order.
    fn requeue(&self, batch: Vec<ViewEventInput>) {
        let mut queue = self.queue.lock();
        for event in batch.into_iter().rev() {
            queue.push_front(event);
        }
        let overflow = queue.len().saturating_sub(self.config.max_queue);
        if overflow > 0 {
            queue.drain(..overflow);
            warn!(dropped = overflow, "view queue full, dropping oldest views");
        }
    }

    fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

enum Flush {
    Drained,
    Pending,
}

/// Client-side view queue with a single background flusher.
pub struct ViewTracker {
    shared: Arc<Shared>,
    viewer_id: String,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ViewTracker {
    /// Start a tracker delivering to `sink`. Must be called inside a tokio runtime.
    pub fn new(mut config: ViewTrackerConfig, sink: Arc<dyn ViewSink>) -> Self {
        config.batch_size = config.batch_size.clamp(1, MAX_BATCH_SIZE);
        config.max_queue = config.max_queue.max(1);
        config.max_retries = config.max_retries.max(1);

        let viewer_id = resolve_viewer_id(&config);
        let shared = Arc::new(Shared {
            config,
            queue: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
        });
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run(Arc::clone(&shared), sink, cancel.clone()));

        Self {
            shared,
            viewer_id,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Build a tracker that reports through `client`.
    pub fn for_client(client: HololithClient, config: ViewTrackerConfig) -> Self {
        Self::new(config, Arc::new(client))
    }

    /// The viewer id attached to every tracked view.
    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    /// Number of views waiting to be sent.
    pub fn pending(&self) -> usize {
        self.shared.len()
    }

    /// Queue a view of `target` and schedule a flush.
    pub fn track(&self, target: &ViewTarget) {
        if self.cancel.is_cancelled() {
            debug!(id = target.target_id(), "view tracked after shutdown, ignoring");
            return;
        }
        self.shared
            .push(ViewEventInput::for_target(target, Some(self.viewer_id.clone())));
        self.shared.wake.notify_one();
    }

    /// Send whatever is queued and stop the background task.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            warn!(error = %e, "view tracker task failed");
        }
    }
}

impl Drop for ViewTracker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(shared: Arc<Shared>, sink: Arc<dyn ViewSink>, cancel: CancellationToken) {
    let mut failures = 0u32;

    'idle: loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = shared.wake.notified() => {}
        }

        let mut delay = shared.config.flush_delay;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break 'idle,
                () = tokio::time::sleep(delay) => {}
            }
            match flush_once(&shared, sink.as_ref(), &mut failures).await {
                Flush::Drained => continue 'idle,
                Flush::Pending => delay = shared.config.retry_delay,
            }
        }
    }

    final_flush(&shared, sink.as_ref()).await;
}

async fn flush_once(shared: &Shared, sink: &dyn ViewSink, failures: &mut u32) -> Flush {
    let batch = shared.take_batch();
    if batch.is_empty() {
        return Flush::Drained;
    }

    match sink.send_batch(&batch).await {
        Ok(accepted) => {
            *failures = 0;
            debug!(sent = batch.len(), accepted, "view batch flushed");
        }
        Err(e) if e.is_retryable() => {
            *failures += 1;
            if *failures >= shared.config.max_retries {
                warn!(
                    error = %e,
                    attempts = *failures,
                    dropped = batch.len(),
                    "view batch dropped after repeated failures"
                );
                *failures = 0;
            } else {
                warn!(error = %e, attempt = *failures, "view batch flush failed, requeueing");
                shared.requeue(batch);
            }
        }
        Err(e) => {
            *failures = 0;
            warn!(error = %e, dropped = batch.len(), "view batch rejected");
        }
    }

    if shared.is_empty() {
        Flush::Drained
    } else {
        Flush::Pending
    }
}

/// One delivery attempt per remaining batch; stops at the first failure.
async fn final_flush(shared: &Shared, sink: &dyn ViewSink) {
    loop {
        let batch = shared.take_batch();
        if batch.is_empty() {
            return;
        }
        if let Err(e) = sink.send_batch(&batch).await {
            warn!(
                error = %e,
                lost = batch.len() + shared.len(),
                "final view flush failed"
            );
            return;
        }
    }
}

fn valid_viewer_id(id: &str) -> bool {
    (VIEWER_ID_MIN_LEN..=VIEWER_ID_MAX_LEN).contains(&id.chars().count())
}

fn resolve_viewer_id(config: &ViewTrackerConfig) -> String {
    if let Some(id) = config.viewer_id.as_deref().filter(|id| !id.is_empty()) {
        if valid_viewer_id(id) {
            return id.to_owned();
        }
        warn!(
            len = id.chars().count(),
            "configured viewer id is out of range, generating one"
        );
    }
    match &config.viewer_id_path {
        Some(path) => load_or_create_viewer_id(path),
        None => Uuid::new_v4().to_string(),
    }
}

fn load_or_create_viewer_id(path: &Path) -> String {
    if let Ok(stored) = std::fs::read_to_string(path) {
        let stored = stored.trim();
        if valid_viewer_id(stored) {
            return stored.to_owned();
        }
        if !stored.is_empty() {
            warn!(path = %path.display(), "stored viewer id is out of range, replacing it");
        }
    }
    let id = Uuid::new_v4().to_string();
    if let Err(e) = std::fs::write(path, &id) {
        warn!(path = %path.display(), error = %e, "could not persist viewer id");
    }
    id
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use hololith_core::{ProductId, StoreId};
    use tokio::time::sleep;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<ViewEventInput>>>,
        failures_left: AtomicU32,
        attempts: AtomicU32,
    }

    impl RecordingSink {
        fn failing(times: u32) -> Arc<Self> {
            let sink = Self::default();
            sink.failures_left.store(times, Ordering::SeqCst);
            Arc::new(sink)
        }

        fn sizes(&self) -> Vec<usize> {
            self.batches.lock().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl ViewSink for RecordingSink {
        async fn send_batch(&self, events: &[ViewEventInput]) -> Result<usize, Error> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(Error::Connection("offline".into()));
            }
            self.batches.lock().push(events.to_vec());
            Ok(events.len())
        }
    }

    fn store(n: usize) -> ViewTarget {
        ViewTarget::Store(StoreId::new(format!("store-{n}")))
    }

    #[tokio::test(start_paused = true)]
    async fn views_wait_for_the_flush_delay() {
        let sink = Arc::new(RecordingSink::default());
        let tracker = ViewTracker::new(ViewTrackerConfig::default(), sink.clone());

        for n in 0..3 {
            tracker.track(&store(n));
        }
        sleep(Duration::from_secs(4)).await;
        assert!(sink.sizes().is_empty());
        assert_eq!(tracker.pending(), 3);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.sizes(), [3]);
        assert_eq!(tracker.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn large_queues_are_sent_in_capped_batches() {
        let sink = Arc::new(RecordingSink::default());
        let config = ViewTrackerConfig {
            batch_size: 500,
            ..ViewTrackerConfig::default()
        };
        let tracker = ViewTracker::new(config, sink.clone());

        for n in 0..120 {
            tracker.track(&store(n));
        }
        sleep(Duration::from_secs(10)).await;
        assert_eq!(sink.sizes(), [50, 50, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_drops_oldest_views() {
        let sink = Arc::new(RecordingSink::default());
        let config = ViewTrackerConfig {
            max_queue: 3,
            ..ViewTrackerConfig::default()
        };
        let tracker = ViewTracker::new(config, sink.clone());

        for n in 0..5 {
            tracker.track(&ViewTarget::Product(ProductId::new(format!("p{n}"))));
        }
        assert_eq!(tracker.pending(), 3);

        sleep(Duration::from_secs(6)).await;
        let batches = sink.batches.lock();
        let ids: Vec<_> = batches[0]
            .iter()
            .filter_map(|e| e.product_id.as_deref())
            .collect();
        assert_eq!(ids, ["p2", "p3", "p4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_batches_are_requeued_then_dropped() {
        let sink = RecordingSink::failing(u32::MAX);
        let config = ViewTrackerConfig {
            max_retries: 3,
            ..ViewTrackerConfig::default()
        };
        let tracker = ViewTracker::new(config, sink.clone());

        tracker.track(&store(1));
        sleep(Duration::from_secs(5) + Duration::from_millis(100)).await;
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.pending(), 1);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried() {
        let sink = RecordingSink::failing(1);
        let tracker = ViewTracker::new(ViewTrackerConfig::default(), sink.clone());

        tracker.track(&store(1));
        tracker.track(&store(2));
        sleep(Duration::from_secs(7)).await;

        assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(sink.sizes(), [2]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_immediately() {
        let sink = Arc::new(RecordingSink::default());
        let tracker = ViewTracker::new(ViewTrackerConfig::default(), sink.clone());

        tracker.track(&store(1));
        tracker.track(&store(2));
        tracker.shutdown().await;
        assert_eq!(sink.sizes(), [2]);

        tracker.track(&store(3));
        assert_eq!(tracker.pending(), 0);
    }

    #[tokio::test]
    async fn events_carry_the_viewer_id() {
        let sink = Arc::new(RecordingSink::default());
        let config = ViewTrackerConfig {
            viewer_id: Some("viewer-fixed-1".into()),
            ..ViewTrackerConfig::default()
        };
        let tracker = ViewTracker::new(config, sink.clone());
        assert_eq!(tracker.viewer_id(), "viewer-fixed-1");

        tracker.track(&store(7));
        tracker.shutdown().await;
        let batches = sink.batches.lock();
        assert_eq!(batches[0][0].viewer_id.as_deref(), Some("viewer-fixed-1"));
        assert_eq!(batches[0][0].event_type, "STORE_VIEW");
        assert_eq!(batches[0][0].store_id.as_deref(), Some("store-7"));
    }

    #[test]
    fn generated_viewer_id_is_persisted() {
        let path = std::env::temp_dir().join(format!("hololith-viewer-{}", Uuid::new_v4()));
        let config = ViewTrackerConfig {
            viewer_id_path: Some(path.clone()),
            ..ViewTrackerConfig::default()
        };

        let first = resolve_viewer_id(&config);
        let second = resolve_viewer_id(&config);
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn out_of_range_viewer_ids_are_replaced() {
        let short = ViewTrackerConfig {
            viewer_id: Some("abc".into()),
            ..ViewTrackerConfig::default()
        };
        let id = resolve_viewer_id(&short);
        assert_ne!(id, "abc");
        assert!(Uuid::parse_str(&id).is_ok());

        let long = ViewTrackerConfig {
            viewer_id: Some("x".repeat(129)),
            ..ViewTrackerConfig::default()
        };
        assert!(valid_viewer_id(&resolve_viewer_id(&long)));

        let path = std::env::temp_dir().join(format!("hololith-viewer-{}", Uuid::new_v4()));
        std::fs::write(&path, "tiny").unwrap();
        let config = ViewTrackerConfig {
            viewer_id_path: Some(path.clone()),
            ..ViewTrackerConfig::default()
        };
        let id = resolve_viewer_id(&config);
        assert!(valid_viewer_id(&id));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), id);

        std::fs::remove_file(&path).unwrap();
    }
}
