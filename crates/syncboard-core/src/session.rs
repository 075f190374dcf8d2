//! Single-resource sync session
//!
//! A `SyncSession` owns one resource's sync lifecycle: it triggers a sync,
//! tracks the local optimistic status, schedules and cancels polling,
//! applies bounded-retry-then-fail, emits notifications, and guarantees
//! cleanup on `destroy()`.
//!
//! ## Ordering
//!
//! Events are applied in the order their async operations resolve, not the
//! order they were issued. Every async result is therefore validated
//! against the session's current generation before being applied; results
//! belonging to a superseded generation are silently dropped.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::SyncBackend;
use crate::config::PollConfig;
use crate::error::SessionError;
use crate::notify::{Notification, NotificationSink};
use crate::status::{resolve, StatusEvent, SyncStatus};

/// Per-resource mutable state. Never locked across an await point.
struct Inner {
    /// Authoritative status last adopted from the server
    server_status: SyncStatus,
    /// When `server_status` was last adopted
    server_updated_at: Option<DateTime<Utc>>,
    /// Local prediction that outranks `server_status` until cleared
    override_status: Option<SyncStatus>,
    /// Bumped on every trigger and on destruction; in-flight results from
    /// older generations are discarded on arrival
    generation: u64,
    consecutive_poll_failures: u32,
    /// At most one poll loop per session
    poll_task: Option<JoinHandle<()>>,
    /// At most one success-revert timer, active only while success shows
    revert_task: Option<JoinHandle<()>>,
    destroyed: bool,
}

impl Inner {
    fn display(&self) -> SyncStatus {
        self.override_status.unwrap_or(self.server_status)
    }
}

struct Shared {
    resource_id: String,
    backend: Arc<dyn SyncBackend>,
    sink: Arc<dyn NotificationSink>,
    poll: PollConfig,
    inner: Mutex<Inner>,
    status_tx: watch::Sender<SyncStatus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Push the resolved display status to subscribers, if it changed.
    fn publish(&self, inner: &Inner) {
        let display = inner.display();
        self.status_tx.send_if_modified(|current| {
            if *current != display {
                *current = display;
                true
            } else {
                false
            }
        });
    }

    /// Adopt a server-reported status for `generation`.
    ///
    /// Returns `true` when the poll loop should stop (status left
    /// `Syncing`, or the result was stale). When `resolving` is set this is
    /// the terminal resolution of a sync attempt: a notification is
    /// emitted and a success schedules the revert timer. `refresh()` adopts
    /// quietly with `resolving` unset.
    fn adopt(self: &Arc<Self>, generation: u64, status: SyncStatus, resolving: bool) -> bool {
        let notification = {
            let mut inner = self.lock();
            if inner.destroyed || inner.generation != generation {
                debug!(resource = %self.resource_id, "discarding stale status result");
                return true;
            }
            inner.consecutive_poll_failures = 0;
            inner.override_status = None;
            inner.server_status = status;
            inner.server_updated_at = Some(Utc::now());
            if status == SyncStatus::Syncing {
                self.publish(&inner);
                return false;
            }
            // Adoption may come from refresh() while a poll loop is live;
            // the loop must die with the status it was polling for, or a
            // later spawn would run two loops for one session
            if let Some(task) = inner.poll_task.take() {
                task.abort();
            }
            self.publish(&inner);

            if resolving && status.is_terminal() {
                Some(match status {
                    SyncStatus::Success => Notification::success(
                        &self.resource_id,
                        format!("Sync complete for '{}'", self.resource_id),
                    ),
                    _ => Notification::failure(
                        &self.resource_id,
                        format!("Sync failed for '{}'", self.resource_id),
                    ),
                })
            } else {
                None
            }
        };

        if resolving && status == SyncStatus::Success {
            self.schedule_revert(generation);
        }
        if let Some(notification) = notification {
            self.sink.notify(notification);
        }
        true
    }

    /// Record a failed poll; returns `true` when the loop should stop.
    fn record_poll_failure(self: &Arc<Self>, generation: u64) -> bool {
        let notification = {
            let mut inner = self.lock();
            if inner.destroyed || inner.generation != generation {
                return true;
            }
            inner.consecutive_poll_failures += 1;
            if inner.consecutive_poll_failures < self.poll.failure_limit {
                // Transient; display unchanged, keep polling
                return false;
            }
            warn!(
                resource = %self.resource_id,
                failures = inner.consecutive_poll_failures,
                "giving up on status polls"
            );
            let display = inner.display();
            inner.override_status = Some(resolve(display, StatusEvent::PollFailureLimitReached));
            inner.poll_task = None;
            self.publish(&inner);
            Notification::failure(
                &self.resource_id,
                format!(
                    "Sync status for '{}' is unknown: status checks kept failing. \
                     Refresh to see the latest state.",
                    self.resource_id
                ),
            )
        };

        self.sink.notify(notification);
        true
    }

    /// The trigger request itself failed; report at once, no retry.
    fn fail_trigger(self: &Arc<Self>, generation: u64, reason: &str) {
        {
            let mut inner = self.lock();
            if inner.destroyed || inner.generation != generation {
                return;
            }
            let display = inner.display();
            inner.override_status = Some(resolve(display, StatusEvent::PollFailureLimitReached));
            inner.poll_task = None;
            self.publish(&inner);
        }
        self.sink.notify(Notification::failure(
            &self.resource_id,
            format!("Could not start sync for '{}': {}", self.resource_id, reason),
        ));
    }

    fn spawn_poll_loop(self: &Arc<Self>, generation: u64) {
        {
            let inner = self.lock();
            if inner.destroyed || inner.generation != generation || inner.poll_task.is_some() {
                return;
            }
        }

        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let interval = shared.poll.poll_interval();
            loop {
                tokio::time::sleep(interval).await;
                if shared.generation() != generation {
                    return;
                }
                match shared.backend.fetch_status(&shared.resource_id).await {
                    Ok(status) => {
                        if shared.adopt(generation, status, true) {
                            return;
                        }
                    }
                    Err(err) => {
                        debug!(
                            resource = %shared.resource_id,
                            error = %err,
                            "status poll failed"
                        );
                        if shared.record_poll_failure(generation) {
                            return;
                        }
                    }
                }
            }
        });

        let mut inner = self.lock();
        if inner.destroyed || inner.generation != generation || inner.poll_task.is_some() {
            handle.abort();
            return;
        }
        inner.poll_task = Some(handle);
    }

    /// Schedule the success-to-idle revert; cancelled by the next trigger.
    fn schedule_revert(self: &Arc<Self>, generation: u64) {
        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(shared.poll.revert_after()).await;
            let mut inner = shared.lock();
            if inner.destroyed || inner.generation != generation {
                return;
            }
            let display = inner.display();
            let next = resolve(display, StatusEvent::RevertTimerFired);
            if next != display {
                // The success has been absorbed; idle is the quiescent truth
                inner.server_status = next;
                inner.override_status = None;
                shared.publish(&inner);
            }
            inner.revert_task = None;
        });

        let mut inner = self.lock();
        if inner.destroyed || inner.generation != generation {
            handle.abort();
            return;
        }
        if let Some(previous) = inner.revert_task.replace(handle) {
            previous.abort();
        }
    }
}

/// Sync lifecycle controller for a single visible resource.
///
/// Created when a resource becomes visible or interactive, destroyed when
/// it leaves view. Must be created inside a tokio runtime. Dropping the
/// session destroys it.
pub struct SyncSession {
    shared: Arc<Shared>,
    status_rx: watch::Receiver<SyncStatus>,
}

impl SyncSession {
    /// Create a session for `resource_id`, starting from the status last
    /// fetched by the caller.
    ///
    /// If the resource is already syncing server-side, the poll loop starts
    /// immediately so the session converges without a trigger.
    pub fn new(
        resource_id: impl Into<String>,
        initial_status: SyncStatus,
        backend: Arc<dyn SyncBackend>,
        sink: Arc<dyn NotificationSink>,
        poll: PollConfig,
    ) -> Self {
        let resource_id = resource_id.into();
        let (status_tx, status_rx) = watch::channel(initial_status);

        let shared = Arc::new(Shared {
            resource_id,
            backend,
            sink,
            poll,
            inner: Mutex::new(Inner {
                server_status: initial_status,
                server_updated_at: None,
                override_status: None,
                generation: 0,
                consecutive_poll_failures: 0,
                poll_task: None,
                revert_task: None,
                destroyed: false,
            }),
            status_tx,
        });

        if initial_status == SyncStatus::Syncing {
            shared.spawn_poll_loop(0);
        }

        Self { shared, status_rx }
    }

    /// The resource this session tracks.
    pub fn resource_id(&self) -> &str {
        &self.shared.resource_id
    }

    /// Current resolved display status. Pure read, never triggers I/O.
    pub fn display_status(&self) -> SyncStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to display status changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }

    /// When the server status was last adopted from a fetch.
    pub fn server_updated_at(&self) -> Option<DateTime<Utc>> {
        self.shared.lock().server_updated_at
    }

    /// Request a sync.
    ///
    /// Shows `syncing` optimistically before any I/O, then asks the server
    /// to start and begins polling. A second trigger while the display is
    /// already `syncing` has no effect. Returns once the immediate outcome
    /// of the start request is known; ongoing progress is observed through
    /// [`SyncSession::subscribe`].
    ///
    /// The only error is misuse of a destroyed session; every expected
    /// failure mode resolves into a display status and a notification.
    pub async fn trigger(&self) -> Result<(), SessionError> {
        let generation = {
            let mut inner = self.shared.lock();
            if inner.destroyed {
                return Err(SessionError::Destroyed(self.shared.resource_id.clone()));
            }
            if inner.display() == SyncStatus::Syncing {
                debug!(
                    resource = %self.shared.resource_id,
                    "trigger ignored, sync already in progress"
                );
                return Ok(());
            }
            inner.generation += 1;
            inner.consecutive_poll_failures = 0;
            if let Some(task) = inner.revert_task.take() {
                task.abort();
            }
            if let Some(task) = inner.poll_task.take() {
                task.abort();
            }
            let display = inner.display();
            inner.override_status = Some(resolve(display, StatusEvent::SyncRequested));
            self.shared.publish(&inner);
            inner.generation
        };

        debug!(resource = %self.shared.resource_id, generation, "sync requested");

        match self.shared.backend.start_sync(&self.shared.resource_id).await {
            Ok(started) if started.accepted => match started.immediate_status {
                Some(status) if status.is_terminal() => {
                    // Server finished inline; no polling needed
                    self.shared.adopt(generation, status, true);
                }
                _ => self.shared.spawn_poll_loop(generation),
            },
            Ok(_) => {
                self.shared
                    .fail_trigger(generation, "sync request was not accepted");
            }
            Err(err) => {
                warn!(
                    resource = %self.shared.resource_id,
                    error = %err,
                    "failed to start sync"
                );
                self.shared.fail_trigger(generation, &err.to_string());
            }
        }

        Ok(())
    }

    /// Fetch the server status once and adopt it, without notifications.
    ///
    /// Clears a held error display and restarts polling if the server
    /// reports an active sync. A result superseded by a concurrent trigger
    /// is discarded.
    pub async fn refresh(&self) -> Result<(), SessionError> {
        let generation = {
            let inner = self.shared.lock();
            if inner.destroyed {
                return Err(SessionError::Destroyed(self.shared.resource_id.clone()));
            }
            inner.generation
        };

        match self.shared.backend.fetch_status(&self.shared.resource_id).await {
            Ok(status) => {
                if !self.shared.adopt(generation, status, false) {
                    self.shared.spawn_poll_loop(generation);
                }
            }
            Err(err) => {
                debug!(
                    resource = %self.shared.resource_id,
                    error = %err,
                    "refresh failed"
                );
            }
        }

        Ok(())
    }

    /// Tear the session down.
    ///
    /// Cancels the poll loop and any revert timer, invalidates in-flight
    /// results, and drops all notification obligations. Safe to call more
    /// than once.
    pub fn destroy(&self) {
        let mut inner = self.shared.lock();
        if inner.destroyed {
            return;
        }
        inner.destroyed = true;
        inner.generation += 1;
        if let Some(task) = inner.poll_task.take() {
            task.abort();
        }
        if let Some(task) = inner.revert_task.take() {
            task.abort();
        }
        debug!(resource = %self.shared.resource_id, "session destroyed");
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.destroy();
    }
}
