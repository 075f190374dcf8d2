//! Multi-resource sync coordination for list views
//!
//! A `SyncSessionRegistry` tracks many resources behind one shared polling
//! timer. Instead of one poll loop per row, every tick performs a single
//! batched status fetch and reconciles all tracked resources from it, so
//! network cost per tick is O(1) regardless of list size.
//!
//! The shared timer runs iff at least one tracked resource is syncing
//! (server-reported or locally predicted); it is recomputed after every
//! state change and stopped the moment nothing is syncing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::SyncBackend;
use crate::config::PollConfig;
use crate::error::SessionError;
use crate::notify::{Notification, NotificationSink};
use crate::status::{resolve, StatusEvent, SyncStatus};

/// State for one tracked resource: a sparse projection of what a dedicated
/// session would hold.
struct Tracked {
    server_status: SyncStatus,
    server_updated_at: Option<DateTime<Utc>>,
    /// Local prediction; kept at `Syncing` from trigger until the batch
    /// poll reports a non-syncing status, then held briefly as the
    /// terminal flash before clearing
    override_status: Option<SyncStatus>,
    /// Bumped on every trigger for this resource
    generation: u64,
    /// At most one pending override-clear timer per resource
    hold_task: Option<JoinHandle<()>>,
}

impl Tracked {
    fn display(&self) -> SyncStatus {
        self.override_status.unwrap_or(self.server_status)
    }
}

struct RegInner {
    resources: HashMap<String, Tracked>,
    /// The single shared poll timer
    poll_task: Option<JoinHandle<()>>,
    /// Bumped whenever a new shared timer is started; a superseded timer
    /// discards its in-flight results
    timer_generation: u64,
    /// Batch-level transport failure counter
    consecutive_poll_failures: u32,
    destroyed: bool,
}

struct RegShared {
    backend: Arc<dyn SyncBackend>,
    sink: Arc<dyn NotificationSink>,
    poll: PollConfig,
    inner: Mutex<RegInner>,
    snapshot_tx: watch::Sender<HashMap<String, SyncStatus>>,
}

impl RegShared {
    fn lock(&self) -> MutexGuard<'_, RegInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Push the current display map to subscribers, if it changed.
    fn publish(&self, inner: &RegInner) {
        let snapshot: HashMap<String, SyncStatus> = inner
            .resources
            .iter()
            .map(|(id, tracked)| (id.clone(), tracked.display()))
            .collect();
        self.snapshot_tx.send_if_modified(|current| {
            if *current != snapshot {
                *current = snapshot;
                true
            } else {
                false
            }
        });
    }

    fn should_run(inner: &RegInner) -> bool {
        inner.resources.values().any(|tracked| {
            tracked.server_status == SyncStatus::Syncing
                || tracked.override_status == Some(SyncStatus::Syncing)
        })
    }

    /// Start or stop the shared timer to match the "anything syncing"
    /// predicate. Never leaves two timers alive.
    fn recompute_timer(self: &Arc<Self>, inner: &mut RegInner) {
        let should_run = Self::should_run(inner);
        if should_run {
            if inner.poll_task.is_none() {
                inner.timer_generation += 1;
                let generation = inner.timer_generation;
                let shared = Arc::clone(self);
                inner.poll_task = Some(tokio::spawn(async move {
                    shared.poll_loop(generation).await;
                }));
            }
        } else if let Some(task) = inner.poll_task.take() {
            task.abort();
        }
    }

    async fn poll_loop(self: Arc<Self>, timer_generation: u64) {
        let interval = self.poll.list_poll_interval();
        loop {
            tokio::time::sleep(interval).await;
            let ids: Vec<String> = {
                let inner = self.lock();
                if inner.destroyed || inner.timer_generation != timer_generation {
                    return;
                }
                inner.resources.keys().cloned().collect()
            };

            match self.backend.fetch_statuses(&ids).await {
                Ok(statuses) => {
                    if self.apply_batch(timer_generation, statuses) {
                        return;
                    }
                }
                Err(err) => {
                    debug!(error = %err, "batched status poll failed");
                    if self.record_batch_failure(timer_generation) {
                        return;
                    }
                }
            }
        }
    }

    /// Reconcile every tracked resource from one batch response.
    ///
    /// Returns `true` when the shared timer should stop. Ids absent from
    /// the response carry no information and are left untouched.
    fn apply_batch(
        self: &Arc<Self>,
        timer_generation: u64,
        statuses: HashMap<String, SyncStatus>,
    ) -> bool {
        let mut notifications = Vec::new();
        let stop = {
            let mut inner = self.lock();
            if inner.destroyed || inner.timer_generation != timer_generation {
                return true;
            }
            inner.consecutive_poll_failures = 0;
            let now = Utc::now();

            let mut holds: Vec<(String, u64, Duration)> = Vec::new();
            for (id, tracked) in inner.resources.iter_mut() {
                let Some(&status) = statuses.get(id) else {
                    continue;
                };
                tracked.server_status = status;
                tracked.server_updated_at = Some(now);

                // A Syncing override marks an in-flight trigger; the first
                // non-syncing server status resolves it
                if tracked.override_status != Some(SyncStatus::Syncing)
                    || status == SyncStatus::Syncing
                {
                    continue;
                }
                match status {
                    SyncStatus::Success => {
                        tracked.override_status = Some(SyncStatus::Success);
                        holds.push((id.clone(), tracked.generation, self.poll.revert_after()));
                        notifications
                            .push(Notification::success(id, format!("Sync complete for '{}'", id)));
                    }
                    SyncStatus::Error => {
                        tracked.override_status = Some(SyncStatus::Error);
                        holds.push((id.clone(), tracked.generation, self.poll.error_hold()));
                        notifications
                            .push(Notification::failure(id, format!("Sync failed for '{}'", id)));
                    }
                    _ => {
                        // Sync evaporated server-side; nothing to report
                        tracked.override_status = None;
                    }
                }
            }

            for (id, generation, delay) in holds {
                let handle = self.schedule_clear(id.clone(), generation, delay);
                if let Some(tracked) = inner.resources.get_mut(&id) {
                    if let Some(previous) = tracked.hold_task.replace(handle) {
                        previous.abort();
                    }
                }
            }

            self.publish(&inner);
            let should_run = Self::should_run(&inner);
            if !should_run {
                // This task is the timer; it exits on its own
                inner.poll_task = None;
            }
            !should_run
        };

        for notification in notifications {
            self.sink.notify(notification);
        }
        stop
    }

    /// Record a failed batch poll; returns `true` when the timer should
    /// stop.
    fn record_batch_failure(self: &Arc<Self>, timer_generation: u64) -> bool {
        let mut notifications = Vec::new();
        let stop = {
            let mut inner = self.lock();
            if inner.destroyed || inner.timer_generation != timer_generation {
                return true;
            }
            inner.consecutive_poll_failures += 1;
            if inner.consecutive_poll_failures < self.poll.failure_limit {
                return false;
            }
            warn!(
                failures = inner.consecutive_poll_failures,
                "giving up on batched status polls"
            );

            // Status is unknown for everything still syncing; surface a
            // definitive error instead of polling forever
            let mut holds: Vec<(String, u64)> = Vec::new();
            for (id, tracked) in inner.resources.iter_mut() {
                if tracked.display() != SyncStatus::Syncing {
                    continue;
                }
                let display = tracked.display();
                tracked.server_status =
                    resolve(display, StatusEvent::PollFailureLimitReached);
                tracked.override_status = Some(SyncStatus::Error);
                holds.push((id.clone(), tracked.generation));
                notifications.push(Notification::failure(
                    id,
                    format!(
                        "Sync status for '{}' is unknown: status checks kept failing. \
                         Refresh to see the latest state.",
                        id
                    ),
                ));
            }
            for (id, generation) in holds {
                let handle = self.schedule_clear(id.clone(), generation, self.poll.error_hold());
                if let Some(tracked) = inner.resources.get_mut(&id) {
                    if let Some(previous) = tracked.hold_task.replace(handle) {
                        previous.abort();
                    }
                }
            }

            self.publish(&inner);
            inner.poll_task = None;
            true
        };

        for notification in notifications {
            self.sink.notify(notification);
        }
        stop
    }

    /// A triggered sync resolved without polling (server finished inline).
    fn resolve_now(self: &Arc<Self>, resource_id: &str, generation: u64, status: SyncStatus) {
        let notification = {
            let mut inner = self.lock();
            if inner.destroyed {
                return;
            }
            let Some(tracked) = inner.resources.get_mut(resource_id) else {
                return;
            };
            if tracked.generation != generation {
                return;
            }
            tracked.server_status = status;
            tracked.server_updated_at = Some(Utc::now());
            tracked.override_status = Some(status);
            let delay = if status == SyncStatus::Success {
                self.poll.revert_after()
            } else {
                self.poll.error_hold()
            };
            let handle = self.schedule_clear(resource_id.to_string(), generation, delay);
            if let Some(previous) = tracked.hold_task.replace(handle) {
                previous.abort();
            }
            self.publish(&inner);
            self.recompute_timer(&mut inner);

            if status == SyncStatus::Success {
                Notification::success(resource_id, format!("Sync complete for '{}'", resource_id))
            } else {
                Notification::failure(resource_id, format!("Sync failed for '{}'", resource_id))
            }
        };
        self.sink.notify(notification);
    }

    /// The trigger request itself failed; report at once, hold the error
    /// briefly, no retry.
    fn fail_trigger(self: &Arc<Self>, resource_id: &str, generation: u64, reason: &str) {
        {
            let mut inner = self.lock();
            if inner.destroyed {
                return;
            }
            let Some(tracked) = inner.resources.get_mut(resource_id) else {
                return;
            };
            if tracked.generation != generation {
                return;
            }
            tracked.override_status = Some(SyncStatus::Error);
            let handle = self.schedule_clear(
                resource_id.to_string(),
                generation,
                self.poll.error_hold(),
            );
            if let Some(previous) = tracked.hold_task.replace(handle) {
                previous.abort();
            }
            self.publish(&inner);
            self.recompute_timer(&mut inner);
        }
        self.sink.notify(Notification::failure(
            resource_id,
            format!("Could not start sync for '{}': {}", resource_id, reason),
        ));
    }

    /// Clear a resource's override after `delay`, unless a newer trigger
    /// superseded it.
    fn schedule_clear(
        self: &Arc<Self>,
        resource_id: String,
        generation: u64,
        delay: Duration,
    ) -> JoinHandle<()> {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut inner = shared.lock();
            if inner.destroyed {
                return;
            }
            let Some(tracked) = inner.resources.get_mut(&resource_id) else {
                return;
            };
            if tracked.generation != generation {
                return;
            }
            tracked.override_status = None;
            tracked.hold_task = None;
            shared.publish(&inner);
            shared.recompute_timer(&mut inner);
        })
    }
}

/// Sync coordination for a list of resources behind one shared timer.
///
/// Must be created inside a tokio runtime. Dropping the registry destroys
/// it.
pub struct SyncSessionRegistry {
    shared: Arc<RegShared>,
    snapshot_rx: watch::Receiver<HashMap<String, SyncStatus>>,
}

impl SyncSessionRegistry {
    pub fn new(
        backend: Arc<dyn SyncBackend>,
        sink: Arc<dyn NotificationSink>,
        poll: PollConfig,
    ) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(HashMap::new());
        let shared = Arc::new(RegShared {
            backend,
            sink,
            poll,
            inner: Mutex::new(RegInner {
                resources: HashMap::new(),
                poll_task: None,
                timer_generation: 0,
                consecutive_poll_failures: 0,
                destroyed: false,
            }),
            snapshot_tx,
        });
        Self {
            shared,
            snapshot_rx,
        }
    }

    /// Track a resource, starting from the status last fetched by the
    /// caller. Re-registering replaces the previous entry and invalidates
    /// its in-flight results.
    pub fn register(&self, resource_id: impl Into<String>, initial_status: SyncStatus) {
        let resource_id = resource_id.into();
        let mut inner = self.shared.lock();
        if inner.destroyed {
            return;
        }
        let generation = match inner.resources.remove(&resource_id) {
            Some(previous) => {
                if let Some(task) = previous.hold_task {
                    task.abort();
                }
                previous.generation + 1
            }
            None => 0,
        };
        inner.resources.insert(
            resource_id,
            Tracked {
                server_status: initial_status,
                server_updated_at: None,
                override_status: None,
                generation,
                hold_task: None,
            },
        );
        self.shared.publish(&inner);
        self.shared.recompute_timer(&mut inner);
    }

    /// Stop tracking a resource. Cancels timers scoped to that id only;
    /// the shared timer keeps running while other resources need it.
    pub fn unregister(&self, resource_id: &str) {
        let mut inner = self.shared.lock();
        if inner.destroyed {
            return;
        }
        let Some(tracked) = inner.resources.remove(resource_id) else {
            return;
        };
        if let Some(task) = tracked.hold_task {
            task.abort();
        }
        debug!(resource = %resource_id, "resource unregistered");
        self.shared.publish(&inner);
        self.shared.recompute_timer(&mut inner);
    }

    /// Request a sync for one tracked resource.
    ///
    /// Same semantics as a single-resource session: optimistic `syncing`
    /// before any I/O, no-op while already syncing, immediate error report
    /// when the start request fails. Resolution arrives through the shared
    /// batch poll.
    pub async fn trigger(&self, resource_id: &str) -> Result<(), SessionError> {
        let generation = {
            let mut inner = self.shared.lock();
            if inner.destroyed {
                return Err(SessionError::Destroyed(resource_id.to_string()));
            }
            let Some(tracked) = inner.resources.get_mut(resource_id) else {
                return Err(SessionError::NotRegistered(resource_id.to_string()));
            };
            if tracked.display() == SyncStatus::Syncing {
                debug!(resource = %resource_id, "trigger ignored, sync already in progress");
                return Ok(());
            }
            tracked.generation += 1;
            if let Some(task) = tracked.hold_task.take() {
                task.abort();
            }
            let display = tracked.display();
            tracked.override_status = Some(resolve(display, StatusEvent::SyncRequested));
            let generation = tracked.generation;
            inner.consecutive_poll_failures = 0;
            self.shared.publish(&inner);
            self.shared.recompute_timer(&mut inner);
            generation
        };

        debug!(resource = %resource_id, generation, "sync requested");

        match self.shared.backend.start_sync(resource_id).await {
            Ok(started) if started.accepted => {
                if let Some(status) = started.immediate_status {
                    if status.is_terminal() {
                        self.shared.resolve_now(resource_id, generation, status);
                    }
                }
            }
            Ok(_) => {
                self.shared
                    .fail_trigger(resource_id, generation, "sync request was not accepted");
            }
            Err(err) => {
                warn!(resource = %resource_id, error = %err, "failed to start sync");
                self.shared
                    .fail_trigger(resource_id, generation, &err.to_string());
            }
        }

        Ok(())
    }

    /// Current resolved display status for one resource. Pure read.
    pub fn display_status(&self, resource_id: &str) -> Option<SyncStatus> {
        self.shared
            .lock()
            .resources
            .get(resource_id)
            .map(Tracked::display)
    }

    /// When a resource's server status was last adopted from a fetch.
    pub fn server_updated_at(&self, resource_id: &str) -> Option<DateTime<Utc>> {
        self.shared
            .lock()
            .resources
            .get(resource_id)
            .and_then(|tracked| tracked.server_updated_at)
    }

    /// Display statuses for every tracked resource.
    pub fn snapshot(&self) -> HashMap<String, SyncStatus> {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to display status changes across all tracked resources.
    pub fn subscribe(&self) -> watch::Receiver<HashMap<String, SyncStatus>> {
        self.snapshot_rx.clone()
    }

    /// Number of tracked resources.
    pub fn resource_count(&self) -> usize {
        self.shared.lock().resources.len()
    }

    /// Whether the shared poll timer is currently running.
    pub fn is_polling(&self) -> bool {
        self.shared.lock().poll_task.is_some()
    }

    /// Tear the registry down: cancels the shared timer and every
    /// per-resource timer. Safe to call more than once.
    pub fn destroy(&self) {
        let mut inner = self.shared.lock();
        if inner.destroyed {
            return;
        }
        inner.destroyed = true;
        inner.timer_generation += 1;
        if let Some(task) = inner.poll_task.take() {
            task.abort();
        }
        for tracked in inner.resources.values_mut() {
            if let Some(task) = tracked.hold_task.take() {
                task.abort();
            }
        }
        debug!("registry destroyed");
    }
}

impl Drop for SyncSessionRegistry {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SyncStarted;
    use crate::notify::NotificationKind;
    use crate::testing::{batch, transport_err, MockBackend, RecordingSink};

    fn registry_with(
        backend: Arc<MockBackend>,
        sink: Arc<RecordingSink>,
    ) -> SyncSessionRegistry {
        SyncSessionRegistry::new(backend, sink, PollConfig::default())
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_unregister_basics() {
        let backend = Arc::new(MockBackend::new());
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), sink);

        registry.register("ds-1", SyncStatus::Idle);
        assert_eq!(registry.resource_count(), 1);
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Idle));
        assert_eq!(registry.display_status("ghost"), None);
        assert!(!registry.is_polling());

        assert_eq!(
            registry.trigger("ghost").await,
            Err(SessionError::NotRegistered("ghost".to_string()))
        );

        registry.unregister("ds-1");
        assert_eq!(registry.resource_count(), 0);
        assert_eq!(registry.display_status("ds-1"), None);

        // Nothing syncing, so the shared timer never ran
        sleep_ms(30_000).await;
        assert_eq!(backend.batch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_full_cycle_with_batched_polls() {
        let backend = Arc::new(MockBackend::new());
        backend.push_batch(Ok(batch(&[
            ("ds-1", SyncStatus::Syncing),
            ("ds-2", SyncStatus::Idle),
        ])));
        backend.push_batch(Ok(batch(&[
            ("ds-1", SyncStatus::Success),
            ("ds-2", SyncStatus::Idle),
        ])));
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), Arc::clone(&sink));

        registry.register("ds-1", SyncStatus::Idle);
        registry.register("ds-2", SyncStatus::Idle);

        registry.trigger("ds-1").await.unwrap();
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Syncing));
        assert!(registry.is_polling());

        // First batch tick at 10s: still syncing
        sleep_ms(10_100).await;
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Syncing));
        assert_eq!(backend.batch_calls(), 1);

        // Second tick resolves to success and stops the timer
        sleep_ms(10_000).await;
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Success));
        assert!(!registry.is_polling());

        let notifications = sink.take();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Success);
        assert_eq!(notifications[0].resource_id, "ds-1");

        // The other row is untouched throughout
        assert_eq!(registry.display_status("ds-2"), Some(SyncStatus::Idle));

        // After the success flash the display falls back to server truth
        sleep_ms(3_100).await;
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Success));
        sleep_ms(30_000).await;
        assert_eq!(backend.batch_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_syncing_starts_shared_timer() {
        let backend = Arc::new(MockBackend::new());
        backend.push_batch(Ok(batch(&[
            ("ds-1", SyncStatus::Idle),
            ("ghost", SyncStatus::Syncing),
        ])));
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), Arc::clone(&sink));

        registry.register("ds-1", SyncStatus::Syncing);
        assert!(registry.is_polling());
        assert!(registry.server_updated_at("ds-1").is_none());

        // One tick reconciles to idle; unknown ids in the response are
        // ignored; the timer stops within the tick
        sleep_ms(10_100).await;
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Idle));
        assert!(registry.server_updated_at("ds-1").is_some());
        assert!(!registry.is_polling());
        assert_eq!(registry.display_status("ghost"), None);

        sleep_ms(30_000).await;
        assert_eq!(backend.batch_calls(), 1);
        // No trigger, so no notification for the external completion
        assert!(sink.take().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregister_last_syncing_resource_stops_timer() {
        let backend = Arc::new(MockBackend::new());
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), sink);

        registry.register("ds-1", SyncStatus::Idle);
        registry.trigger("ds-1").await.unwrap();
        assert!(registry.is_polling());

        registry.unregister("ds-1");
        assert!(!registry.is_polling());

        sleep_ms(30_000).await;
        assert_eq!(backend.batch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_failure_limit_promotes_to_error() {
        let backend = Arc::new(MockBackend::new());
        backend.push_batch(Err(transport_err()));
        backend.push_batch(Err(transport_err()));
        backend.push_batch(Err(transport_err()));
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), Arc::clone(&sink));

        registry.register("ds-1", SyncStatus::Idle);
        registry.register("ds-2", SyncStatus::Idle);
        registry.trigger("ds-1").await.unwrap();

        // Two failures stay invisible
        sleep_ms(20_100).await;
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Syncing));
        assert!(sink.take().is_empty());

        // Third failure hits the limit: error surfaced, timer stopped
        sleep_ms(10_000).await;
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Error));
        assert!(!registry.is_polling());
        let notifications = sink.take();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Failure);

        // The idle row is unaffected
        assert_eq!(registry.display_status("ds-2"), Some(SyncStatus::Idle));

        sleep_ms(40_000).await;
        assert_eq!(backend.batch_calls(), 3);
        // Status stays unknown-as-error until a refresh or new trigger
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_success_resets_failure_counter() {
        let backend = Arc::new(MockBackend::new());
        backend.push_batch(Err(transport_err()));
        backend.push_batch(Err(transport_err()));
        backend.push_batch(Ok(batch(&[("ds-1", SyncStatus::Syncing)])));
        backend.push_batch(Err(transport_err()));
        backend.push_batch(Err(transport_err()));
        backend.push_batch(Ok(batch(&[("ds-1", SyncStatus::Success)])));
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), Arc::clone(&sink));

        registry.register("ds-1", SyncStatus::Idle);
        registry.trigger("ds-1").await.unwrap();

        sleep_ms(60_100).await;
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Success));
        assert_eq!(backend.batch_calls(), 6);
        assert_eq!(sink.take().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_start_failure_clears_after_hold() {
        let backend = Arc::new(MockBackend::new());
        backend.push_start(Err(transport_err()));
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), Arc::clone(&sink));

        registry.register("ds-1", SyncStatus::Idle);
        registry.trigger("ds-1").await.unwrap();

        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Error));
        assert!(!registry.is_polling());
        let notifications = sink.take();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Failure);

        // List views clear the error after the hold; the row falls back to
        // the last server-reported status
        sleep_ms(5_100).await;
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Idle));
        assert_eq!(backend.batch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_terminal_resolution() {
        let backend = Arc::new(MockBackend::new());
        backend.push_start(Ok(SyncStarted::finished(SyncStatus::Success)));
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), Arc::clone(&sink));

        registry.register("ds-1", SyncStatus::Idle);
        registry.trigger("ds-1").await.unwrap();

        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Success));
        assert!(!registry.is_polling());
        assert_eq!(sink.take().len(), 1);

        sleep_ms(30_000).await;
        assert_eq!(backend.batch_calls(), 0);
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_resource_independence() {
        let backend = Arc::new(MockBackend::new());
        backend.push_batch(Ok(batch(&[
            ("ds-1", SyncStatus::Syncing),
            ("ds-2", SyncStatus::Syncing),
        ])));
        backend.push_batch(Ok(batch(&[
            ("ds-1", SyncStatus::Error),
            ("ds-2", SyncStatus::Syncing),
        ])));
        backend.push_batch(Ok(batch(&[("ds-2", SyncStatus::Success)])));
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), Arc::clone(&sink));

        registry.register("ds-1", SyncStatus::Idle);
        registry.register("ds-2", SyncStatus::Idle);
        registry.trigger("ds-1").await.unwrap();
        registry.trigger("ds-2").await.unwrap();
        assert_eq!(backend.start_calls(), 2);

        // Tick 2 fails ds-1; ds-2 keeps the shared timer alive
        sleep_ms(20_100).await;
        assert_eq!(registry.display_status("ds-1"), Some(SyncStatus::Error));
        assert_eq!(registry.display_status("ds-2"), Some(SyncStatus::Syncing));
        assert!(registry.is_polling());

        // Tick 3 completes ds-2 and stops the timer
        sleep_ms(10_000).await;
        assert_eq!(registry.display_status("ds-2"), Some(SyncStatus::Success));
        assert!(!registry.is_polling());

        let notifications = sink.take();
        assert_eq!(notifications.len(), 2);
        assert_eq!(backend.batch_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrigger_while_syncing_is_noop() {
        let backend = Arc::new(MockBackend::new());
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), sink);

        registry.register("ds-1", SyncStatus::Idle);
        registry.trigger("ds-1").await.unwrap();
        registry.trigger("ds-1").await.unwrap();

        assert_eq!(backend.start_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_cancels_everything() {
        let backend = Arc::new(MockBackend::new());
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), Arc::clone(&sink));

        registry.register("ds-1", SyncStatus::Idle);
        registry.trigger("ds-1").await.unwrap();
        registry.destroy();
        registry.destroy();

        sleep_ms(120_000).await;
        assert_eq!(backend.batch_calls(), 0);
        assert!(sink.take().is_empty());

        assert_eq!(
            registry.trigger("ds-1").await,
            Err(SessionError::Destroyed("ds-1".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregister_after_destroy_keeps_timer_stopped() {
        let backend = Arc::new(MockBackend::new());
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), sink);

        registry.register("ds-1", SyncStatus::Idle);
        registry.register("ds-2", SyncStatus::Idle);
        registry.trigger("ds-1").await.unwrap();
        registry.destroy();
        assert!(!registry.is_polling());

        // ds-1 still displays syncing, but unregistering the other row
        // must not bring the shared timer back to life
        registry.unregister("ds-2");
        assert!(!registry.is_polling());

        sleep_ms(60_000).await;
        assert_eq!(backend.batch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_observes_display_map() {
        let backend = Arc::new(MockBackend::new());
        let sink = Arc::new(RecordingSink::new());
        let registry = registry_with(Arc::clone(&backend), sink);

        let mut rx = registry.subscribe();
        assert!(rx.borrow().is_empty());

        registry.register("ds-1", SyncStatus::Idle);
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().get("ds-1"),
            Some(&SyncStatus::Idle)
        );

        registry.trigger("ds-1").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().get("ds-1"),
            Some(&SyncStatus::Syncing)
        );
    }
}
