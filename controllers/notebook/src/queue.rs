//! Work queue and dispatcher.
//!
//! The watcher turns cluster notifications into [`WorkItem`]s keyed by
//! SparkNotebook identity. The [`Dispatcher`] runs them through an
//! [`EventHandler`] with these guarantees:
//!
//! - at most one item per key is in flight; later items for a busy key wait
//!   in arrival order
//! - distinct keys run concurrently, up to the configured worker limit
//! - transient failures are retried after a per-key Fibonacci backoff;
//!   permanent failures are logged and dropped
//! - a success resets the key's backoff

use crate::backoff::FibonacciBackoff;
use crate::error::ControllerError;
use crds::{NotebookKey, SparkNotebook};
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// What happened to a SparkNotebook.
#[derive(Debug, Clone, PartialEq)]
pub enum NotebookEvent {
    Create(SparkNotebook),
    Update {
        old: Box<SparkNotebook>,
        new: Box<SparkNotebook>,
    },
    Delete(SparkNotebook),
}

impl NotebookEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NotebookEvent::Create(_) => "create",
            NotebookEvent::Update { .. } => "update",
            NotebookEvent::Delete(_) => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub key: NotebookKey,
    pub event: NotebookEvent,
}

impl WorkItem {
    pub fn new(key: NotebookKey, event: NotebookEvent) -> Self {
        Self { key, event }
    }
}

/// Handles one work item at a time for a given key.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, item: &WorkItem) -> Result<(), ControllerError>;
}

pub type WorkSender = mpsc::UnboundedSender<WorkItem>;
pub type WorkReceiver = mpsc::UnboundedReceiver<WorkItem>;

/// Creates the channel between the watcher and the dispatcher.
pub fn work_queue() -> (WorkSender, WorkReceiver) {
    mpsc::unbounded_channel()
}

type Outcome = Result<Result<(), ControllerError>, Box<dyn Any + Send>>;

pub struct Dispatcher {
    handler: Arc<dyn EventHandler>,
    concurrency: usize,
    backoff_min: Duration,
    backoff_max: Duration,
    /// Items waiting per key, oldest first
    pending: HashMap<NotebookKey, VecDeque<WorkItem>>,
    /// Keys with pending items and nothing in flight, in the order they became runnable
    ready: VecDeque<NotebookKey>,
    in_flight: HashSet<NotebookKey>,
    backoffs: HashMap<NotebookKey, FibonacciBackoff>,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn EventHandler>, concurrency: usize, backoff_min: Duration, backoff_max: Duration) -> Self {
        Self {
            handler,
            concurrency: concurrency.max(1),
            backoff_min,
            backoff_max,
            pending: HashMap::new(),
            ready: VecDeque::new(),
            in_flight: HashSet::new(),
            backoffs: HashMap::new(),
        }
    }

    /// Runs until the sender side is closed and all queued work, including
    /// scheduled retries, has finished.
    pub async fn run(mut self, mut rx: WorkReceiver) {
        let mut tasks: JoinSet<(WorkItem, Outcome)> = JoinSet::new();
        let mut retries: JoinSet<WorkItem> = JoinSet::new();
        let mut closed = false;

        loop {
            while tasks.len() < self.concurrency {
                let Some(item) = self.next_ready() else {
                    break;
                };
                let handler = Arc::clone(&self.handler);
                tasks.spawn(async move {
                    let outcome = AssertUnwindSafe(handler.handle(&item)).catch_unwind().await;
                    (item, outcome)
                });
            }

            if closed && tasks.is_empty() && retries.is_empty() && self.pending.is_empty() {
                debug!("Work queue closed and drained, dispatcher exiting");
                return;
            }

            tokio::select! {
                received = rx.recv(), if !closed => match received {
                    Some(item) => self.enqueue(item),
                    None => closed = true,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Ok((item, outcome)) => {
                        if let Some(delay) = self.complete(&item, outcome) {
                            retries.spawn(async move {
                                tokio::time::sleep(delay).await;
                                item
                            });
                        }
                    }
                    Err(e) => error!("Reconcile task failed to join: {}", e),
                },
                Some(joined) = retries.join_next(), if !retries.is_empty() => {
                    if let Ok(item) = joined {
                        self.enqueue(item);
                    }
                }
            }
        }
    }

    fn enqueue(&mut self, item: WorkItem) {
        let key = item.key.clone();
        let queue = self.pending.entry(key.clone()).or_default();
        let was_idle = queue.is_empty();
        queue.push_back(item);
        if was_idle && !self.in_flight.contains(&key) {
            self.ready.push_back(key);
        }
    }

    fn next_ready(&mut self) -> Option<WorkItem> {
        let key = self.ready.pop_front()?;
        let queue = self.pending.get_mut(&key)?;
        let item = queue.pop_front()?;
        if queue.is_empty() {
            self.pending.remove(&key);
        }
        self.in_flight.insert(key);
        Some(item)
    }

    /// Records a finished item and returns the retry delay if it must run again.
    fn complete(&mut self, item: &WorkItem, outcome: Outcome) -> Option<Duration> {
        let key = &item.key;
        self.in_flight.remove(key);
        if self.pending.contains_key(key) {
            self.ready.push_back(key.clone());
        }

        let err = match outcome {
            Ok(Ok(())) => {
                debug!("Reconciled {} event for {}", item.event.kind(), key);
                self.backoffs.remove(key);
                return None;
            }
            Ok(Err(e)) => e,
            Err(_) => {
                error!("Reconcile of {} event for {} panicked", item.event.kind(), key);
                return Some(self.next_backoff(key));
            }
        };

        if err.is_permanent() {
            error!("Permanent failure on {} event for {}: {}", item.event.kind(), key, err);
            self.backoffs.remove(key);
            return None;
        }

        let delay = self.next_backoff(key);
        warn!(
            "Failed {} event for {}: {} (retrying in {:?})",
            item.event.kind(),
            key,
            err,
            delay
        );
        Some(delay)
    }

    fn next_backoff(&mut self, key: &NotebookKey) -> Duration {
        let (min, max) = (self.backoff_min, self.backoff_max);
        self.backoffs
            .entry(key.clone())
            .or_insert_with(|| FibonacciBackoff::new(min, max))
            .next_backoff()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn item(name: &str, event_id: u32) -> WorkItem {
        let mut nb = SparkNotebook::new(name, crds::SparkNotebookSpec { id: Some(event_id) });
        nb.metadata.namespace = Some("team".to_string());
        WorkItem::new(NotebookKey::new("team", name), NotebookEvent::Create(nb))
    }

    #[derive(Default)]
    struct RecordingHandler {
        /// (key name, event id) in completion order
        handled: Mutex<Vec<(String, u32)>>,
        running: Mutex<HashSet<String>>,
        max_parallel: Mutex<usize>,
        /// Remaining failures per key name, and whether they are permanent
        failures: Mutex<HashMap<String, (u32, bool)>>,
        overlap_seen: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, item: &WorkItem) -> Result<(), ControllerError> {
            let name = item.key.name.clone();
            {
                let mut running = self.running.lock().unwrap();
                if !running.insert(name.clone()) {
                    *self.overlap_seen.lock().unwrap() = true;
                }
                let mut max = self.max_parallel.lock().unwrap();
                *max = (*max).max(running.len());
            }

            tokio::time::sleep(Duration::from_millis(10)).await;

            self.running.lock().unwrap().remove(&name);
            let NotebookEvent::Create(nb) = &item.event else {
                return Ok(());
            };

            if let Some((remaining, permanent)) = self.failures.lock().unwrap().get_mut(&name)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(if *permanent {
                    ControllerError::PoolExhausted {
                        name,
                        max_id: 0,
                    }
                } else {
                    ControllerError::AssignmentContention { name, attempts: 3 }
                });
            }

            self.handled
                .lock()
                .unwrap()
                .push((name, nb.assigned_id().unwrap_or_default()));
            Ok(())
        }
    }

    fn dispatcher(handler: &Arc<RecordingHandler>, concurrency: usize) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(handler) as Arc<dyn EventHandler>,
            concurrency,
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
    }

    #[tokio::test]
    async fn test_items_for_one_key_run_in_order_without_overlap() {
        let handler = Arc::new(RecordingHandler::default());
        let (tx, rx) = work_queue();
        for event_id in 0..5 {
            tx.send(item("a", event_id)).unwrap();
        }
        drop(tx);

        dispatcher(&handler, 4).run(rx).await;

        let handled = handler.handled.lock().unwrap().clone();
        let ids: Vec<u32> = handled.iter().map(|(_, id)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(!*handler.overlap_seen.lock().unwrap());
        assert_eq!(*handler.max_parallel.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_concurrently_up_to_limit() {
        let handler = Arc::new(RecordingHandler::default());
        let (tx, rx) = work_queue();
        for name in ["a", "b", "c", "d", "e"] {
            tx.send(item(name, 0)).unwrap();
        }
        drop(tx);

        dispatcher(&handler, 2).run(rx).await;

        assert_eq!(handler.handled.lock().unwrap().len(), 5);
        assert_eq!(*handler.max_parallel.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let handler = Arc::new(RecordingHandler::default());
        handler.failures.lock().unwrap().insert("a".to_string(), (2, false));
        let (tx, rx) = work_queue();
        tx.send(item("a", 7)).unwrap();
        drop(tx);

        dispatcher(&handler, 1).run(rx).await;

        assert_eq!(handler.handled.lock().unwrap().clone(), vec![("a".to_string(), 7)]);
        assert_eq!(handler.failures.lock().unwrap()["a"].0, 0);
    }

    #[tokio::test]
    async fn test_permanent_failures_are_not_retried() {
        let handler = Arc::new(RecordingHandler::default());
        handler.failures.lock().unwrap().insert("a".to_string(), (1, true));
        let (tx, rx) = work_queue();
        tx.send(item("a", 7)).unwrap();
        tx.send(item("b", 8)).unwrap();
        drop(tx);

        dispatcher(&handler, 1).run(rx).await;

        // Only b succeeded; a's single failure was consumed and never retried
        assert_eq!(handler.handled.lock().unwrap().clone(), vec![("b".to_string(), 8)]);
        assert_eq!(handler.failures.lock().unwrap()["a"].0, 0);
    }

    #[test]
    fn test_complete_resets_backoff_on_success() {
        let handler: Arc<dyn EventHandler> = Arc::new(RecordingHandler::default());
        let mut dispatcher = Dispatcher::new(handler, 1, Duration::from_secs(5), Duration::from_secs(300));
        let work = item("a", 0);
        let transient = || {
            Ok(Err(ControllerError::AssignmentContention {
                name: "a".to_string(),
                attempts: 3,
            }))
        };

        assert_eq!(dispatcher.complete(&work, transient()), Some(Duration::from_secs(5)));
        assert_eq!(dispatcher.complete(&work, transient()), Some(Duration::from_secs(5)));
        assert_eq!(dispatcher.complete(&work, transient()), Some(Duration::from_secs(10)));
        assert_eq!(dispatcher.complete(&work, Ok(Ok(()))), None);
        assert_eq!(dispatcher.complete(&work, transient()), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_busy_key_is_not_made_ready_twice() {
        let handler: Arc<dyn EventHandler> = Arc::new(RecordingHandler::default());
        let mut dispatcher = Dispatcher::new(handler, 4, Duration::from_secs(5), Duration::from_secs(300));

        dispatcher.enqueue(item("a", 0));
        dispatcher.enqueue(item("a", 1));
        let first = dispatcher.next_ready().unwrap();
        assert_eq!(first, item("a", 0));
        // a is in flight, so its second item must wait
        assert!(dispatcher.next_ready().is_none());

        dispatcher.complete(&first, Ok(Ok(())));
        assert_eq!(dispatcher.next_ready().unwrap(), item("a", 1));
    }
}
