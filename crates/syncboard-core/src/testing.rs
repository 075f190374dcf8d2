//! Test doubles for the coordination layer
//!
//! `MockBackend` replays scripted responses, optionally after an artificial
//! delay so tests can race in-flight results against triggers and
//! destruction under the paused tokio clock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{SyncBackend, SyncStarted};
use crate::error::BackendError;
use crate::notify::{Notification, NotificationSink};
use crate::status::SyncStatus;

pub(crate) fn transport_err() -> BackendError {
    BackendError::Transport("connection reset".to_string())
}

struct Scripted<T> {
    delay: Option<Duration>,
    result: Result<T, BackendError>,
}

pub(crate) struct MockBackend {
    fetch_script: Mutex<VecDeque<Scripted<SyncStatus>>>,
    batch_script: Mutex<VecDeque<Scripted<HashMap<String, SyncStatus>>>>,
    start_script: Mutex<VecDeque<Scripted<SyncStarted>>>,
    fetch_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    start_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            fetch_script: Mutex::new(VecDeque::new()),
            batch_script: Mutex::new(VecDeque::new()),
            start_script: Mutex::new(VecDeque::new()),
            fetch_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
        }
    }

    pub fn push_fetch(&self, result: Result<SyncStatus, BackendError>) {
        self.fetch_script
            .lock()
            .unwrap()
            .push_back(Scripted { delay: None, result });
    }

    pub fn push_fetch_after(&self, delay: Duration, result: Result<SyncStatus, BackendError>) {
        self.fetch_script.lock().unwrap().push_back(Scripted {
            delay: Some(delay),
            result,
        });
    }

    pub fn push_batch(&self, result: Result<HashMap<String, SyncStatus>, BackendError>) {
        self.batch_script
            .lock()
            .unwrap()
            .push_back(Scripted { delay: None, result });
    }

    pub fn push_start(&self, result: Result<SyncStarted, BackendError>) {
        self.start_script
            .lock()
            .unwrap()
            .push_back(Scripted { delay: None, result });
    }

    pub fn push_start_after(&self, delay: Duration, result: Result<SyncStarted, BackendError>) {
        self.start_script.lock().unwrap().push_back(Scripted {
            delay: Some(delay),
            result,
        });
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }
}

/// Helper to build a batch response.
pub(crate) fn batch(entries: &[(&str, SyncStatus)]) -> HashMap<String, SyncStatus> {
    entries
        .iter()
        .map(|(id, status)| (id.to_string(), *status))
        .collect()
}

async fn run<T>(scripted: Option<Scripted<T>>, default: T) -> Result<T, BackendError> {
    match scripted {
        Some(scripted) => {
            if let Some(delay) = scripted.delay {
                tokio::time::sleep(delay).await;
            }
            scripted.result
        }
        None => Ok(default),
    }
}

#[async_trait]
impl SyncBackend for MockBackend {
    async fn fetch_status(&self, _resource_id: &str) -> Result<SyncStatus, BackendError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.fetch_script.lock().unwrap().pop_front();
        run(next, SyncStatus::Syncing).await
    }

    async fn fetch_statuses(
        &self,
        _resource_ids: &[String],
    ) -> Result<HashMap<String, SyncStatus>, BackendError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.batch_script.lock().unwrap().pop_front();
        run(next, HashMap::new()).await
    }

    async fn start_sync(&self, _resource_id: &str) -> Result<SyncStarted, BackendError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.start_script.lock().unwrap().pop_front();
        run(next, SyncStarted::accepted()).await
    }
}

pub(crate) struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
        }
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications.lock().unwrap())
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}
