use std::io::Write;

use anyhow::{Context, Result};
use smash_core::{
    api::{Client, JsonHandler},
    config::Config,
    constants::STATUS_PATH,
};
use tracing::debug;

/// Prints the server's status document.
pub async fn execute(config: &Config, out: &mut impl Write) -> Result<()> {
    let client = Client::with_handler(config, JsonHandler).context("Failed to create client")?;
    debug!(base_url = %client.base_url(), "Querying server status");
    let status = client
        .get(STATUS_PATH)
        .await
        .with_context(|| format!("Failed to query {}", client.base_url()))?
        .json()?;
    writeln!(out, "{}", serde_json::to_string_pretty(&status)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use smash_core::test_utils::mock_config;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_status_prints_pretty_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STATUS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "api_version": "2",
                "database_connection": {"connected": true}
            })))
            .mount(&server)
            .await;

        let mut out = Vec::new();
        execute(&mock_config(&server.uri(), "2.13"), &mut out).await.unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("\"api_version\": \"2\""));
        assert!(output.contains("\"connected\": true"));
    }

    #[tokio::test]
    async fn test_status_fails_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut out = Vec::new();
        let err = execute(&mock_config(&server.uri(), "2.13"), &mut out)
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Failed to query"));
        assert!(out.is_empty());
    }
}
