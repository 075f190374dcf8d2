//! Backend contract for status polling and sync triggering
//!
//! The coordination layer consumes exactly two collaborator operations:
//! "fetch current status of resource X" and "request a sync of resource X".
//! Both are async; both are safe to retry at the call site. The core never
//! retries `start_sync` itself.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::status::SyncStatus;

/// Server response to a sync-start request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncStarted {
    /// Whether the server accepted the request
    pub accepted: bool,
    /// Terminal status known at accept time, if the server finished inline
    pub immediate_status: Option<SyncStatus>,
}

impl SyncStarted {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            immediate_status: None,
        }
    }

    pub fn finished(status: SyncStatus) -> Self {
        Self {
            accepted: true,
            immediate_status: Some(status),
        }
    }
}

/// The two collaborator operations the core polls and triggers through.
#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// Fetch the current status of one resource.
    async fn fetch_status(&self, resource_id: &str) -> Result<SyncStatus, BackendError>;

    /// Fetch statuses for many resources in one request.
    ///
    /// Ids missing from the response carry no information; callers leave
    /// their local state untouched.
    async fn fetch_statuses(
        &self,
        resource_ids: &[String],
    ) -> Result<HashMap<String, SyncStatus>, BackendError>;

    /// Ask the server to start syncing a resource.
    async fn start_sync(&self, resource_id: &str) -> Result<SyncStarted, BackendError>;
}
