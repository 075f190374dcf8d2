//! Config command handlers

use anyhow::{bail, Context, Result};

use syncboard_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "server_url": config.server_url,
                    "api_key_set": config.api_key.is_some(),
                    "poll": {
                        "poll_interval_ms": config.poll.poll_interval_ms,
                        "list_poll_interval_ms": config.poll.list_poll_interval_ms,
                        "revert_after_ms": config.poll.revert_after_ms,
                        "error_hold_ms": config.poll.error_hold_ms,
                        "failure_limit": config.poll.failure_limit
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.server_url.as_deref().unwrap_or(""));
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!(
                "  server_url:            {}",
                config.server_url.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  api_key:               {}",
                if config.api_key.is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!("  poll_interval_ms:      {}", config.poll.poll_interval_ms);
            println!(
                "  list_poll_interval_ms: {}",
                config.poll.list_poll_interval_ms
            );
            println!("  revert_after_ms:       {}", config.poll.revert_after_ms);
            println!("  error_hold_ms:         {}", config.poll.error_hold_ms);
            println!("  failure_limit:         {}", config.poll.failure_limit);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    match key.as_str() {
        "server_url" => {
            config.server_url = none_if_cleared(&value);
        }
        "api_key" => {
            config.api_key = none_if_cleared(&value);
        }
        "poll_interval_ms" => {
            config.poll.poll_interval_ms =
                value.parse().context("Invalid value for poll_interval_ms")?;
        }
        "list_poll_interval_ms" => {
            config.poll.list_poll_interval_ms = value
                .parse()
                .context("Invalid value for list_poll_interval_ms")?;
        }
        "revert_after_ms" => {
            config.poll.revert_after_ms =
                value.parse().context("Invalid value for revert_after_ms")?;
        }
        "error_hold_ms" => {
            config.poll.error_hold_ms =
                value.parse().context("Invalid value for error_hold_ms")?;
        }
        "failure_limit" => {
            config.poll.failure_limit =
                value.parse().context("Invalid value for failure_limit")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: server_url, api_key, poll_interval_ms, \
                 list_poll_interval_ms, revert_after_ms, error_hold_ms, failure_limit",
                key
            );
        }
    }

    config.save().context("Failed to save configuration")?;
    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn none_if_cleared(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}
