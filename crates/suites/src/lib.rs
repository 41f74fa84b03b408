//! Functional test suites for the Pulp REST API.
//!
//! Request-body generators and multi-step flows live here so they can be
//! unit tested; the suites that talk to a live server are under `tests/`.
use anyhow::{Context, Result};
use smash_core::{
    api::Client,
    config::{Config, get_config},
    selectors::Skip,
    utils::is_plugin_installed,
};
use tracing_subscriber::EnvFilter;

pub mod pulp3;
pub mod puppet;
pub mod rpm;

#[cfg(test)]
mod test_utils;

/// Loads the settings describing the server under test.
pub fn live_config() -> Result<Config> {
    get_config(None).context("Failed to load pulp-smash settings")
}

/// Skips a suite when the server lacks the plugin for `type_id`.
pub async fn require_plugin(cfg: &Config, type_id: &str) -> Result<Option<Skip>> {
    let client = Client::new(cfg)?;
    let installed = is_plugin_installed(&client, type_id)
        .await
        .with_context(|| format!("Failed to list content types while looking for '{type_id}'"))?;
    if installed {
        Ok(None)
    } else {
        Ok(Some(Skip::new(format!(
            "The server has no plugin providing '{type_id}' content"
        ))))
    }
}

/// Routes `tracing` output into the test harness, filtered by `RUST_LOG`.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
