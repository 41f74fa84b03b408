//! A thin HTTP client for the Pulp REST API.
//!
//! Every request goes through a [`ResponseHandler`], which decides what a
//! "successful" response is. The default [`SafeHandler`] rejects error
//! statuses and waits for the tasks spawned by `202 Accepted` responses.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
    config::{Auth, Config, SmashConfigError},
    constants::TASK_FINISHED_STATES,
};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Config(#[from] SmashConfigError),
    #[error("Request to {url} failed with status {status}: {body}")]
    Status {
        status: StatusCode,
        url: Url,
        body: String,
    },
    #[error("Invalid JSON in response from {url}: {source}")]
    InvalidJson {
        url: Url,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, url::ParseError),
    #[error("Task {href} failed: {error}")]
    TaskFailed { href: String, error: Value },
    #[error("Task {href} did not finish within {timeout:?}")]
    TaskTimeout { href: String, timeout: Duration },
    #[error("Response from {url} has no '{field}' field")]
    MissingField { url: String, field: String },
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub url: Url,
    pub body: String,
}

impl Response {
    pub fn json(&self) -> Result<Value, ApiError> {
        serde_json::from_str(&self.body).map_err(|source| ApiError::InvalidJson {
            url: self.url.clone(),
            source,
        })
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Fails with [`ApiError::Status`] unless the status is 2xx.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Status {
                status: self.status,
                url: self.url,
                body: self.body,
            })
        }
    }

    /// The `_href` of the entity in the body.
    pub fn href(&self) -> Result<String, ApiError> {
        field_str(&self.json()?, "_href", self.url.as_str())
    }
}

fn field_str(value: &Value, field: &str, url: &str) -> Result<String, ApiError> {
    value[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ApiError::MissingField {
            url: url.to_string(),
            field: field.to_string(),
        })
}

/// Decides what to do with a response before it reaches the caller.
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    async fn handle(&self, client: &Client, response: Response) -> Result<Response, ApiError>;
}

/// Returns every response untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

#[async_trait]
impl ResponseHandler for EchoHandler {
    async fn handle(&self, _client: &Client, response: Response) -> Result<Response, ApiError> {
        Ok(response)
    }
}

/// Rejects non-2xx responses.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodeHandler;

#[async_trait]
impl ResponseHandler for CodeHandler {
    async fn handle(&self, _client: &Client, response: Response) -> Result<Response, ApiError> {
        response.error_for_status()
    }
}

/// Rejects non-2xx responses and waits for spawned tasks on `202 Accepted`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SafeHandler;

#[async_trait]
impl ResponseHandler for SafeHandler {
    async fn handle(&self, client: &Client, response: Response) -> Result<Response, ApiError> {
        let response = response.error_for_status()?;
        if response.status == StatusCode::ACCEPTED {
            let call_report = response.json()?;
            client.poll_spawned_tasks(&call_report).await?;
        }
        Ok(response)
    }
}

/// Rejects non-2xx responses and responses whose body is not JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonHandler;

#[async_trait]
impl ResponseHandler for JsonHandler {
    async fn handle(&self, _client: &Client, response: Response) -> Result<Response, ApiError> {
        let response = response.error_for_status()?;
        response.json()?;
        Ok(response)
    }
}

/// HTTP client bound to one Pulp deployment.
#[derive(Clone)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    auth: Option<Auth>,
    handler: Arc<dyn ResponseHandler>,
    poll_interval: Duration,
    task_timeout: Duration,
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("poll_interval", &self.poll_interval)
            .field("task_timeout", &self.task_timeout)
            .finish()
    }
}

impl Client {
    /// Creates a client for the configured API system using [`SafeHandler`].
    pub fn new(cfg: &Config) -> Result<Self, ApiError> {
        Self::with_handler(cfg, SafeHandler)
    }

    pub fn with_handler<H>(cfg: &Config, handler: H) -> Result<Self, ApiError>
    where
        H: ResponseHandler + 'static,
    {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!cfg.verify_tls())
            .build()?;
        Ok(Self {
            base_url: cfg.api_base_url()?,
            http,
            auth: Some(cfg.pulp.auth.clone()),
            handler: Arc::new(handler),
            poll_interval: cfg.poll_interval(),
            task_timeout: cfg.task_timeout(),
            request_timeout: None,
        })
    }

    /// Fails requests that take longer than `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Targets another root URL, keeping credentials and handler.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_auth(mut self, auth: Option<Auth>) -> Self {
        self.auth = auth;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a path or an absolute `_href` against the base URL.
    pub fn url_for(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(path.to_string(), e))
    }

    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        self.request(Method::GET, path, &[], None).await
    }

    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, ApiError> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Response, ApiError> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Response, ApiError> {
        self.request(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Response, ApiError> {
        self.request(Method::PATCH, path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, ApiError> {
        self.request(Method::DELETE, path, &[], None).await
    }

    /// Sends a request and passes the response through the handler.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        let response = self.send(method, path, query, body).await?;
        self.handler.handle(self, response).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        let url = self.url_for(path)?;
        debug!(%method, %url, "Sending request");

        let mut builder = self.http.request(method, url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(auth) = &self.auth {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await?;
        debug!(%status, %url, "Received response");

        Ok(Response { status, url, body })
    }

    /// Waits for every task in a call report, including tasks those tasks
    /// spawn, and returns their final reports.
    pub async fn poll_spawned_tasks(&self, call_report: &Value) -> Result<Vec<Value>, ApiError> {
        let mut pending = spawned_task_hrefs(call_report);
        pending.reverse();
        let mut reports = Vec::new();
        while let Some(href) = pending.pop() {
            let report = self.poll_task(&href).await?;
            let mut children = spawned_task_hrefs(&report);
            children.reverse();
            pending.extend(children);
            reports.push(report);
        }
        Ok(reports)
    }

    /// Polls a task until it reaches a final state.
    pub async fn poll_task(&self, href: &str) -> Result<Value, ApiError> {
        let deadline = tokio::time::Instant::now() + self.task_timeout;
        loop {
            let report = self
                .send(Method::GET, href, &[], None)
                .await?
                .error_for_status()?
                .json()?;
            let state = report["state"].as_str().unwrap_or_default();
            debug!(href, state, "Polled task");

            if TASK_FINISHED_STATES.contains(&state) {
                if state == "error" || !report["error"].is_null() {
                    return Err(ApiError::TaskFailed {
                        href: href.to_string(),
                        error: report["error"].clone(),
                    });
                }
                return Ok(report);
            }

            if tokio::time::Instant::now() + self.poll_interval > deadline {
                return Err(ApiError::TaskTimeout {
                    href: href.to_string(),
                    timeout: self.task_timeout,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn spawned_task_hrefs(report: &Value) -> Vec<String> {
    report["spawned_tasks"]
        .as_array()
        .map(|tasks| {
            tasks
                .iter()
                .filter_map(|task| task["_href"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
