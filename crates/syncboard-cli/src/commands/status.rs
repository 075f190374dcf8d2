//! Status command handler

use anyhow::{Context, Result};

use syncboard_core::{Config, SyncBackend, SyncStatus};

use crate::backend::HttpBackend;
use crate::output::Output;

/// Fetch and print the current status of one or more data sources
pub async fn show(ids: Vec<String>, output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let backend = HttpBackend::from_config(&config)?;

    if let [id] = ids.as_slice() {
        let status = backend
            .fetch_status(id)
            .await
            .with_context(|| format!("Failed to fetch status for '{}'", id))?;
        output.print_status(id, status);
        return Ok(());
    }

    let statuses = backend
        .fetch_statuses(&ids)
        .await
        .context("Failed to fetch statuses")?;
    let rows: Vec<(String, Option<SyncStatus>)> = ids
        .into_iter()
        .map(|id| {
            let status = statuses.get(&id).copied();
            (id, status)
        })
        .collect();
    output.print_statuses(&rows);
    Ok(())
}
