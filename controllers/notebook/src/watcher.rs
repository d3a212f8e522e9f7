//! Kubernetes resource watcher.
//!
//! Turns the SparkNotebook watch stream into work items. The stream only
//! carries the current state of an object, so the watcher keeps the last
//! state it saw per key to tell creates from updates and to hand the update
//! handler both the old and the new object.

use crate::error::ControllerError;
use crate::queue::{NotebookEvent, WorkItem, WorkSender};
use crds::{NotebookKey, SparkNotebook};
use futures::StreamExt;
use kube::Api;
use kube_runtime::watcher::Event;
use kube_runtime::{watcher, WatchStreamExt};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Classifies watch events into work items.
#[derive(Debug, Default)]
pub struct EventClassifier {
    last_seen: HashMap<NotebookKey, SparkNotebook>,
    /// Keys seen since the current re-list started
    relisted: Option<HashSet<NotebookKey>>,
}

impl EventClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&mut self, event: Event<SparkNotebook>) -> Vec<WorkItem> {
        match event {
            Event::Init => {
                debug!("SparkNotebook re-list started");
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            Event::InitApply(notebook) => {
                if let (Some(relisted), Some(key)) = (self.relisted.as_mut(), notebook.key()) {
                    relisted.insert(key);
                }
                self.observe(notebook).into_iter().collect()
            }
            Event::InitDone => self.finish_relist(),
            Event::Apply(notebook) => self.observe(notebook).into_iter().collect(),
            Event::Delete(notebook) => {
                let Some(key) = notebook.key() else {
                    return Vec::new();
                };
                self.last_seen.remove(&key);
                vec![WorkItem::new(key, NotebookEvent::Delete(notebook))]
            }
        }
    }

    fn observe(&mut self, notebook: SparkNotebook) -> Option<WorkItem> {
        let key = notebook.key()?;
        match self.last_seen.insert(key.clone(), notebook.clone()) {
            None if Self::needs_assignment(&notebook) => Some(WorkItem::new(key, NotebookEvent::Create(notebook))),
            None => {
                debug!("Tracking existing SparkNotebook {}", key);
                None
            }
            Some(old) if old.spec == notebook.spec && old.is_initialized() == notebook.is_initialized() => None,
            // An ID without status means the status write was lost; the
            // update path ignores uninitialized notebooks
            Some(_) if Self::needs_assignment(&notebook) && notebook.assigned_id().is_some() => {
                Some(WorkItem::new(key, NotebookEvent::Create(notebook)))
            }
            Some(old) => Some(WorkItem::new(
                key,
                NotebookEvent::Update {
                    old: Box::new(old),
                    new: Box::new(notebook),
                },
            )),
        }
    }

    /// A notebook first seen without status is waiting for an ID. One that
    /// already carries an error was refused before and waits for a backfill,
    /// unless it holds an ID whose status write was lost.
    fn needs_assignment(notebook: &SparkNotebook) -> bool {
        !notebook.is_initialized() && (notebook.status_error().is_none() || notebook.assigned_id().is_some())
    }

    /// Emits deletes for notebooks that vanished while the watch was down.
    fn finish_relist(&mut self) -> Vec<WorkItem> {
        let Some(relisted) = self.relisted.take() else {
            return Vec::new();
        };
        let gone: Vec<NotebookKey> = self
            .last_seen
            .keys()
            .filter(|key| !relisted.contains(*key))
            .cloned()
            .collect();
        debug!("SparkNotebook re-list complete, {} removed while disconnected", gone.len());
        gone.into_iter()
            .filter_map(|key| {
                let notebook = self.last_seen.remove(&key)?;
                Some(WorkItem::new(key, NotebookEvent::Delete(notebook)))
            })
            .collect()
    }
}

/// Watches SparkNotebooks and feeds the work queue.
pub struct Watcher {
    api: Api<SparkNotebook>,
    queue: WorkSender,
}

impl Watcher {
    pub fn new(api: Api<SparkNotebook>, queue: WorkSender) -> Self {
        Self { api, queue }
    }

    /// Runs until the stream ends or the work queue is closed.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Starting SparkNotebook watcher");

        let mut classifier = EventClassifier::new();
        let mut stream = Box::pin(watcher(self.api, watcher::Config::default()).default_backoff());

        while let Some(result) = stream.next().await {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!("SparkNotebook watch error (retrying): {}", e);
                    continue;
                }
            };
            for item in classifier.classify(event) {
                debug!("Queueing {} event for {}", item.event.kind(), item.key);
                self.queue
                    .send(item)
                    .map_err(|_| ControllerError::Watch("work queue closed".to_string()))?;
            }
        }

        Err(ControllerError::Watch("SparkNotebook watch stream ended".to_string()))
    }
}
