//! Test utilities for smash-core.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use serde_json::json;
use tempfile::Builder;

use crate::config::Config;

/// Creates a temporary settings file with the given content.
/// Uses tempfile::Builder to ensure unique directories for parallel tests.
///
/// # Panics
/// Panics if temp directory creation or file writing fails.
pub fn create_temp_config(content: &str) -> PathBuf {
    let temp_dir = Builder::new()
        .prefix("pulp-smash-test")
        .rand_bytes(8)
        .tempdir()
        .unwrap();
    let config_path = temp_dir.path().join("settings.yml");
    File::create(&config_path)
        .unwrap()
        .write_all(content.as_bytes())
        .unwrap();
    // Keep the temp directory alive by leaking it (this is just for tests)
    let _ = Box::leak(Box::new(temp_dir));
    config_path
}

/// Settings targeting a mock server, with no waits.
pub fn mock_config(base_uri: &str, version: &str) -> Config {
    let url = url::Url::parse(base_uri).unwrap();
    let content = format!(
        r#"
pulp:
  auth: [admin, admin]
  version: "{version}"
systems:
  - hostname: {host}
    roles:
      api:
        scheme: {scheme}
        port: {port}
        verify: false
timing:
  settle_delay_secs: 0
  task_timeout_secs: 2
  poll_interval_ms: 10
"#,
        host = url.host_str().unwrap(),
        scheme = url.scheme(),
        port = url.port_or_known_default().unwrap(),
    );
    Config::from_yaml(&content).unwrap()
}

/// A Pulp 2 call report spawning the given task hrefs.
pub fn call_report(task_hrefs: &[&str]) -> serde_json::Value {
    let tasks: Vec<_> = task_hrefs
        .iter()
        .map(|href| json!({ "_href": href, "task_id": href.trim_end_matches('/').rsplit('/').next() }))
        .collect();
    json!({ "result": null, "error": null, "spawned_tasks": tasks })
}
