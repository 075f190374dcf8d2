//! Sync command handler

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use syncboard_core::{ChannelSink, Config, NotificationKind, SyncBackend, SyncSession};

use crate::backend::HttpBackend;
use crate::output::Output;

/// Trigger a sync and follow the session until a terminal resolution
pub async fn run(id: String, no_wait: bool, output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let backend = Arc::new(HttpBackend::from_config(&config)?);

    // Seed the session with the server's current status, so triggering a
    // resource that is already syncing attaches to the running sync
    // instead of starting another
    let initial = backend
        .fetch_status(&id)
        .await
        .with_context(|| format!("Failed to fetch status for '{}'", id))?;

    let (sink, mut notifications) = ChannelSink::new();
    let session = SyncSession::new(&id, initial, backend, Arc::new(sink), config.poll.clone());

    session.trigger().await?;
    output.message(&format!("Sync requested for '{}'", id));

    if no_wait {
        return Ok(());
    }

    let mut status_rx = session.subscribe();
    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    bail!("Sync session ended unexpectedly");
                }
                let status = *status_rx.borrow_and_update();
                output.message(&format!("  status: {}", status));
            }
            notification = notifications.recv() => {
                let Some(notification) = notification else {
                    bail!("Sync session ended unexpectedly");
                };
                match notification.kind {
                    NotificationKind::Success => {
                        output.success(&notification.message);
                        return Ok(());
                    }
                    NotificationKind::Failure => bail!("{}", notification.message),
                }
            }
        }
    }
}
