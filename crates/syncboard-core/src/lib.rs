//! Syncboard Core Library
//!
//! This crate provides the sync status coordination layer for Syncboard,
//! an admin dashboard for remotely-synchronized tabular data sources.
//!
//! # Architecture
//!
//! Display status is a pure function of server-reported status plus a local
//! override: a resource shows its override while one is set, otherwise
//! whatever the server last reported. Transitions go through a pure reducer;
//! sessions own the timers, generation counters, and notifications around it.
//!
//! # Quick Start
//!
//! ```text
//! let backend = Arc::new(HttpBackend::from_config(&config)?);
//! let (sink, mut notifications) = ChannelSink::new();
//! let session = SyncSession::new("ds-1", SyncStatus::Idle, backend, Arc::new(sink), config.poll);
//!
//! session.trigger().await?;
//! let mut status = session.subscribe();
//! while status.changed().await.is_ok() {
//!     println!("{}", *status.borrow());
//! }
//! ```
//!
//! # Modules
//!
//! - `status`: Status model and the pure transition reducer
//! - `session`: Single-resource sync session (detail views)
//! - `registry`: Multi-resource registry with one shared timer (list views)
//! - `backend`: Backend trait for status polls and sync triggers
//! - `notify`: User-facing notification plumbing
//! - `config`: Application configuration
//! - `error`: Error types

pub mod backend;
pub mod config;
pub mod error;
pub mod notify;
pub mod registry;
pub mod session;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{SyncBackend, SyncStarted};
pub use config::{Config, PollConfig};
pub use error::{BackendError, SessionError};
pub use notify::{ChannelSink, Notification, NotificationKind, NotificationSink, NullSink};
pub use registry::SyncSessionRegistry;
pub use session::SyncSession;
pub use status::{resolve, StatusEvent, SyncStatus};
