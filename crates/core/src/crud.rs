//! Generic create/update/read/delete lifecycle checks.
//!
//! A [`CrudCase`] supplies the request bodies. [`CrudLifecycle::run`] drives
//! one entity through all four steps, recording every response, and the
//! `check_*` methods compare what the server returned with what was sent.
//! Each check returns all mismatches rather than stopping at the first.
use std::{collections::HashMap, fmt};

use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    api::{ApiError, Client, EchoHandler, Response},
    config::Config,
    constants::REPOSITORY_PATH,
    utils::ResourceTracker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrudStep {
    Create,
    Update,
    Read,
    Delete,
}

impl fmt::Display for CrudStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrudStep::Create => "create",
            CrudStep::Update => "update",
            CrudStep::Read => "read",
            CrudStep::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// How an entity type accepts updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStyle {
    /// Body is `{"delta": {...}}`; the response is a call report whose
    /// `result` holds the entity. Deletion is asynchronous (202).
    Delta,
    /// Body is the attribute map; the response is the entity itself.
    Flat,
}

pub trait CrudCase: Send + Sync {
    /// Collection the entity is created in.
    fn path(&self) -> &str {
        REPOSITORY_PATH
    }

    fn create_body(&self) -> Value;

    fn update_body(&self) -> Value;

    fn update_style(&self) -> UpdateStyle {
        UpdateStyle::Delta
    }
}

/// A value the server returned that differs from the expectation.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub step: CrudStep,
    pub key: String,
    pub expected: Value,
    pub received: Value,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}': expected {}, received {}",
            self.step, self.key, self.expected, self.received
        )
    }
}

/// Bodies sent and responses received while exercising one entity.
#[derive(Debug)]
pub struct CrudLifecycle {
    style: UpdateStyle,
    bodies: HashMap<CrudStep, Value>,
    responses: HashMap<CrudStep, Response>,
}

impl CrudLifecycle {
    /// Creates, updates, reads and deletes one entity.
    ///
    /// Requests are sent with an [`EchoHandler`], so unexpected status codes
    /// are reported by [`check_status_codes`](Self::check_status_codes)
    /// rather than aborting the run.
    pub async fn run(cfg: &Config, case: &dyn CrudCase) -> Result<Self, ApiError> {
        let client = Client::with_handler(cfg, EchoHandler)?;
        Self::run_with(&client, case).await
    }

    /// Like [`run`](Self::run) with a caller-supplied client.
    ///
    /// If a request fails after the entity was created, the entity is
    /// deleted before the error is returned.
    pub async fn run_with(client: &Client, case: &dyn CrudCase) -> Result<Self, ApiError> {
        let create_body = case.create_body();
        let update_body = case.update_body();

        let mut responses = HashMap::new();
        let created = client.post(case.path(), &create_body).await?;
        let href = created.href()?;
        responses.insert(CrudStep::Create, created);

        let mut tracker = ResourceTracker::new();
        tracker.track(href.as_str());
        match Self::update_read_delete(client, &href, &update_body).await {
            Ok(later) => responses.extend(later),
            Err(e) => {
                if let Err(cleanup) = tracker.cleanup(client).await {
                    warn!(href = %href, error = %cleanup, "Failed to clean up after error");
                }
                return Err(e);
            }
        }

        let bodies = HashMap::from([
            (CrudStep::Create, create_body),
            (CrudStep::Update, update_body),
        ]);
        Ok(Self {
            style: case.update_style(),
            bodies,
            responses,
        })
    }

    async fn update_read_delete(
        client: &Client,
        href: &str,
        update_body: &Value,
    ) -> Result<[(CrudStep, Response); 3], ApiError> {
        let updated = client.put(href, update_body).await?;
        let read = client.get_with_query(href, &[("details", "true")]).await?;
        let deleted = client.delete(href).await?;
        Ok([
            (CrudStep::Update, updated),
            (CrudStep::Read, read),
            (CrudStep::Delete, deleted),
        ])
    }

    pub fn response(&self, step: CrudStep) -> Option<&Response> {
        self.responses.get(&step)
    }

    pub fn body(&self, step: CrudStep) -> Option<&Value> {
        self.bodies.get(&step)
    }

    pub fn expected_status_codes(&self) -> [(CrudStep, u16); 4] {
        let delete = match self.style {
            UpdateStyle::Delta => 202,
            UpdateStyle::Flat => 200,
        };
        [
            (CrudStep::Create, 201),
            (CrudStep::Update, 200),
            (CrudStep::Read, 200),
            (CrudStep::Delete, delete),
        ]
    }

    pub fn check_status_codes(&self) -> Vec<Mismatch> {
        self.expected_status_codes()
            .into_iter()
            .filter_map(|(step, code)| {
                let received = self.responses.get(&step).map(Response::status_code);
                (received != Some(code)).then(|| Mismatch {
                    step,
                    key: "status_code".to_string(),
                    expected: Value::from(code),
                    received: received.map(Value::from).unwrap_or(Value::Null),
                })
            })
            .collect()
    }

    /// The created entity carries the requested attributes.
    ///
    /// Repositories do not echo importer or distributor settings, so keys
    /// starting with `importer` or `distributors` are not compared.
    pub fn check_create(&self) -> Result<Vec<Mismatch>, ApiError> {
        let received = self.json(CrudStep::Create)?;
        let body = self.bodies.get(&CrudStep::Create).cloned().unwrap_or_default();
        let mut expected = body.as_object().cloned().unwrap_or_default();
        if self.style == UpdateStyle::Delta {
            expected.retain(|key, _| !is_unechoed_key(key));
        }
        Ok(compare(CrudStep::Create, &expected, &received))
    }

    /// The update response carries the requested changes.
    pub fn check_update(&self) -> Result<Vec<Mismatch>, ApiError> {
        let json = self.json(CrudStep::Update)?;
        let received = match self.style {
            UpdateStyle::Delta => json["result"].clone(),
            UpdateStyle::Flat => json,
        };
        Ok(compare(CrudStep::Update, &self.updated_attributes(), &received))
    }

    /// A fresh read reflects the requested changes.
    pub fn check_read(&self) -> Result<Vec<Mismatch>, ApiError> {
        let received = self.json(CrudStep::Read)?;
        Ok(compare(CrudStep::Read, &self.updated_attributes(), &received))
    }

    /// Number of tasks the update spawned. Only call reports have tasks.
    pub fn check_spawned_tasks(&self, expected: usize) -> Result<Vec<Mismatch>, ApiError> {
        let json = self.json(CrudStep::Update)?;
        let received = json["spawned_tasks"].as_array().map(Vec::len);
        if received == Some(expected) {
            return Ok(Vec::new());
        }
        Ok(vec![Mismatch {
            step: CrudStep::Update,
            key: "spawned_tasks".to_string(),
            expected: Value::from(expected),
            received: received.map(Value::from).unwrap_or(Value::Null),
        }])
    }

    fn updated_attributes(&self) -> Map<String, Value> {
        let body = self.bodies.get(&CrudStep::Update).cloned().unwrap_or_default();
        let attributes = match self.style {
            UpdateStyle::Delta => body["delta"].clone(),
            UpdateStyle::Flat => body,
        };
        attributes.as_object().cloned().unwrap_or_default()
    }

    fn json(&self, step: CrudStep) -> Result<Value, ApiError> {
        match self.responses.get(&step) {
            Some(response) => response.json(),
            None => Ok(Value::Null),
        }
    }
}

fn is_unechoed_key(key: &str) -> bool {
    key.starts_with("importer") || key.starts_with("distributors")
}

fn compare(step: CrudStep, expected: &Map<String, Value>, received: &Value) -> Vec<Mismatch> {
    expected
        .iter()
        .filter(|(key, value)| &received[key.as_str()] != *value)
        .map(|(key, value)| Mismatch {
            step,
            key: key.clone(),
            expected: value.clone(),
            received: received[key.as_str()].clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::REPOSITORY_GROUP_PATH;
    use crate::test_utils::{call_report, mock_config};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct RepoCase;

    impl CrudCase for RepoCase {
        fn create_body(&self) -> Value {
            json!({
                "id": "repo-1",
                "notes": {"_repo-type": "rpm-repo"},
                "importer_type_id": "yum_importer",
                "importer_config": {},
                "distributors": [{"distributor_id": "d1"}]
            })
        }

        fn update_body(&self) -> Value {
            json!({"delta": {"display_name": "new name"}})
        }
    }

    struct GroupCase;

    impl CrudCase for GroupCase {
        fn path(&self) -> &str {
            REPOSITORY_GROUP_PATH
        }

        fn create_body(&self) -> Value {
            json!({"id": "group-1", "display_name": "old"})
        }

        fn update_body(&self) -> Value {
            json!({"display_name": "new"})
        }

        fn update_style(&self) -> UpdateStyle {
            UpdateStyle::Flat
        }
    }

    const REPO_HREF: &str = "/pulp/api/v2/repositories/repo-1/";

    async fn mount_repo_create(server: &MockServer, notes: Value) {
        Mock::given(method("POST"))
            .and(path(REPOSITORY_PATH))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "repo-1", "display_name": "repo-1", "notes": notes, "_href": REPO_HREF
            })))
            .mount(server)
            .await;
    }

    async fn mount_repo_server(server: &MockServer, read_name: &str) {
        let href = REPO_HREF;
        mount_repo_create(server, json!({"_repo-type": "rpm-repo"})).await;
        Mock::given(method("PUT"))
            .and(path(href))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"id": "repo-1", "display_name": "new name"},
                "error": null,
                "spawned_tasks": []
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(href))
            .and(query_param("details", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "repo-1", "display_name": read_name, "importers": []
            })))
            .mount(server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(href))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(call_report(&["/pulp/api/v2/tasks/t1/"])),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_repository_lifecycle_passes_all_checks() {
        let server = MockServer::start().await;
        mount_repo_server(&server, "new name").await;

        let cfg = mock_config(&server.uri(), "2.13");
        let lifecycle = CrudLifecycle::run(&cfg, &RepoCase).await.unwrap();

        assert_eq!(lifecycle.check_status_codes(), Vec::<Mismatch>::new());
        assert_eq!(lifecycle.check_create().unwrap(), Vec::<Mismatch>::new());
        assert_eq!(lifecycle.check_update().unwrap(), Vec::<Mismatch>::new());
        assert_eq!(lifecycle.check_read().unwrap(), Vec::<Mismatch>::new());
        assert_eq!(lifecycle.check_spawned_tasks(0).unwrap(), Vec::<Mismatch>::new());
    }

    #[tokio::test]
    async fn test_repository_lifecycle_reports_stale_read() {
        let server = MockServer::start().await;
        mount_repo_server(&server, "stale").await;

        let cfg = mock_config(&server.uri(), "2.13");
        let lifecycle = CrudLifecycle::run(&cfg, &RepoCase).await.unwrap();

        let mismatches = lifecycle.check_read().unwrap();
        assert_eq!(
            mismatches,
            vec![Mismatch {
                step: CrudStep::Read,
                key: "display_name".to_string(),
                expected: json!("new name"),
                received: json!("stale"),
            }]
        );
        assert_eq!(
            mismatches[0].to_string(),
            "read 'display_name': expected \"new name\", received \"stale\""
        );
        assert_eq!(lifecycle.check_spawned_tasks(1).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_group_lifecycle_uses_flat_updates() {
        let server = MockServer::start().await;
        let href = "/pulp/api/v2/repo_groups/group-1/";
        Mock::given(method("POST"))
            .and(path(REPOSITORY_GROUP_PATH))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "group-1", "display_name": "old", "_href": href
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(href))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "group-1", "display_name": "new", "_href": href
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(href))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "group-1", "display_name": "new"
            })))
            .mount(&server)
            .await;
        // Deleting a group is synchronous, a 202 here is a failure
        Mock::given(method("DELETE"))
            .and(path(href))
            .respond_with(ResponseTemplate::new(202).set_body_json(call_report(&[])))
            .mount(&server)
            .await;

        let cfg = mock_config(&server.uri(), "2.13");
        let lifecycle = CrudLifecycle::run(&cfg, &GroupCase).await.unwrap();

        assert_eq!(lifecycle.check_create().unwrap(), Vec::<Mismatch>::new());
        assert_eq!(lifecycle.check_update().unwrap(), Vec::<Mismatch>::new());
        assert_eq!(lifecycle.check_read().unwrap(), Vec::<Mismatch>::new());
        assert_eq!(
            lifecycle.check_status_codes(),
            vec![Mismatch {
                step: CrudStep::Delete,
                key: "status_code".to_string(),
                expected: json!(200),
                received: json!(202),
            }]
        );
    }

    #[tokio::test]
    async fn test_create_reports_dropped_notes() {
        let server = MockServer::start().await;
        mount_repo_create(&server, json!({})).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(call_report(&[])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "repo-1"})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(202).set_body_json(call_report(&[])))
            .mount(&server)
            .await;

        let cfg = mock_config(&server.uri(), "2.13");
        let lifecycle = CrudLifecycle::run(&cfg, &RepoCase).await.unwrap();

        assert_eq!(
            lifecycle.check_create().unwrap(),
            vec![Mismatch {
                step: CrudStep::Create,
                key: "notes".to_string(),
                expected: json!({"_repo-type": "rpm-repo"}),
                received: json!({}),
            }]
        );
    }

    #[tokio::test]
    async fn test_run_deletes_entity_when_later_step_fails() {
        let server = MockServer::start().await;
        mount_repo_create(&server, json!({"_repo-type": "rpm-repo"})).await;
        // A PUT slower than the client timeout fails the run after create
        Mock::given(method("PUT"))
            .and(path(REPO_HREF))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(REPO_HREF))
            .respond_with(ResponseTemplate::new(202).set_body_json(call_report(&[])))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = mock_config(&server.uri(), "2.13");
        let client = Client::with_handler(&cfg, EchoHandler)
            .unwrap()
            .with_request_timeout(Duration::from_millis(200));
        let err = CrudLifecycle::run_with(&client, &RepoCase).await.unwrap_err();

        assert!(matches!(err, ApiError::Http(_)));
    }

    #[tokio::test]
    async fn test_run_fails_without_href() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error_message": "bad"})))
            .mount(&server)
            .await;

        let cfg = mock_config(&server.uri(), "2.13");
        let err = CrudLifecycle::run(&cfg, &RepoCase).await.unwrap_err();

        assert!(matches!(err, ApiError::MissingField { field, .. } if field == "_href"));
    }
}
