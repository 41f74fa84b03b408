//! Fixtures shared by the test suites.
use tracing::{debug, warn};

use crate::{
    api::{ApiError, Client},
    config::Config,
    constants::PLUGIN_TYPES_PATH,
};

/// A random identifier, suitable for repository ids and names.
pub fn uuid4() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Waits for the server to apply a change made by an earlier request.
pub async fn settle(cfg: &Config) {
    let delay = cfg.settle_delay();
    if !delay.is_zero() {
        debug!(?delay, "Waiting for server-side changes to settle");
        tokio::time::sleep(delay).await;
    }
}

/// Whether the server has a plugin providing content type `type_id`.
pub async fn is_plugin_installed(client: &Client, type_id: &str) -> Result<bool, ApiError> {
    let types = client.get(PLUGIN_TYPES_PATH).await?.json()?;
    Ok(types
        .as_array()
        .map(|types| types.iter().any(|t| t["id"] == type_id))
        .unwrap_or(false))
}

/// Records hrefs of resources created by a test so they can be deleted
/// afterwards.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    hrefs: Vec<String>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, href: impl Into<String>) {
        self.hrefs.push(href.into());
    }

    pub fn len(&self) -> usize {
        self.hrefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hrefs.is_empty()
    }

    /// Deletes every tracked resource, newest first.
    ///
    /// Every deletion is attempted; the first failure is returned.
    pub async fn cleanup(&mut self, client: &Client) -> Result<(), ApiError> {
        let mut first_error = None;
        while let Some(href) = self.hrefs.pop() {
            if let Err(e) = client.delete(&href).await {
                warn!(href = %href, error = %e, "Failed to delete resource");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_config;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_uuid4_is_unique_and_hyphenated() {
        let a = uuid4();
        let b = uuid4();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert_eq!(a.matches('-').count(), 4);
    }

    #[tokio::test]
    async fn test_is_plugin_installed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PLUGIN_TYPES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "rpm", "display_name": "RPM"},
                {"id": "erratum", "display_name": "Erratum"}
            ])))
            .mount(&server)
            .await;
        let client = Client::new(&mock_config(&server.uri(), "2.13")).unwrap();

        assert!(is_plugin_installed(&client, "rpm").await.unwrap());
        assert!(!is_plugin_installed(&client, "puppet_module").await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_deletes_all_and_reports_first_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/pulp/api/v2/repo_groups/a/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/pulp/api/v2/repo_groups/b/"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        let client = Client::new(&mock_config(&server.uri(), "2.13")).unwrap();

        let mut tracker = ResourceTracker::new();
        tracker.track("/pulp/api/v2/repo_groups/a/");
        tracker.track("/pulp/api/v2/repo_groups/b/");
        assert_eq!(tracker.len(), 2);
        let result = tracker.cleanup(&client).await;

        assert!(matches!(result, Err(ApiError::Status { .. })));
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_settle_without_delay_returns_immediately() {
        let cfg = mock_config("http://localhost:8000", "2.13");
        let start = std::time::Instant::now();
        settle(&cfg).await;
        assert!(start.elapsed() < std::time::Duration::from_secs(1));
    }
}
