//! Decide whether a test can run against the configured deployment.
//!
//! Tests that cannot run return a [`Skip`] instead of failing. Known server
//! bugs are looked up in the Pulp Redmine tracker.
use std::{collections::HashMap, sync::Mutex};

use once_cell::sync::Lazy;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{config::Config, version::Version};

pub const DEFAULT_BUG_TRACKER_URL: &str = "https://pulp.plan.io/";

const TESTABLE_STATUSES: [&str; 5] = [
    "MODIFIED",
    "ON_QA",
    "VERIFIED",
    "CLOSED - COMPLETE",
    "CLOSED - CURRENTRELEASE",
];

const UNTESTABLE_STATUSES: [&str; 7] = [
    "NEW",
    "ASSIGNED",
    "POST",
    "CLOSED - DUPLICATE",
    "CLOSED - NOTABUG",
    "CLOSED - WONTFIX",
    "CLOSED - WORKSFORME",
];

const TARGET_PLATFORM_RELEASE: &str = "Target Platform Release";

/// Why a test did not run.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Skipped: {reason}")]
pub struct Skip {
    pub reason: String,
}

impl Skip {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn log(&self) {
        warn!(reason = %self.reason, "Skipping test");
    }
}

/// Unwraps `Ok` or logs the [`Skip`] and returns from the enclosing test.
#[macro_export]
macro_rules! unwrap_or_skip {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(skip) => {
                $crate::selectors::Skip::log(&skip);
                return;
            }
        }
    };
}

/// Skips unless the configured Pulp version is at least `min_version`.
pub fn require(cfg: &Config, min_version: &str) -> Result<(), Skip> {
    let min: Version = min_version
        .parse()
        .map_err(|e| Skip::new(format!("{e}")))?;
    if cfg.pulp.version < min {
        return Err(Skip::new(format!(
            "This test requires Pulp {min} or later, but Pulp {} is under test",
            cfg.pulp.version
        )));
    }
    Ok(())
}

/// Skips when a fixture produced by an earlier step is missing.
pub fn skip_if_unset<'a, T>(value: Option<&'a T>, name: &str) -> Result<&'a T, Skip> {
    value.ok_or_else(|| Skip::new(format!("'{name}' was not set by an earlier step")))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bug {
    pub status: String,
    pub target_platform_release: Option<Version>,
}

#[derive(Deserialize)]
struct RedmineIssueResponse {
    issue: RedmineIssue,
}

#[derive(Deserialize)]
struct RedmineIssue {
    status: RedmineStatus,
    #[serde(default)]
    custom_fields: Vec<RedmineCustomField>,
}

#[derive(Deserialize)]
struct RedmineStatus {
    name: String,
}

#[derive(Deserialize)]
struct RedmineCustomField {
    name: String,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

impl From<RedmineIssue> for Bug {
    fn from(issue: RedmineIssue) -> Self {
        let target_platform_release = issue
            .custom_fields
            .into_iter()
            .find(|f| f.name == TARGET_PLATFORM_RELEASE)
            .and_then(|f| f.value)
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()));
        Bug {
            status: issue.status.name,
            target_platform_release,
        }
    }
}

/// Looks up bugs in a Redmine instance, caching every answer.
pub struct BugTracker {
    base_url: Url,
    http: reqwest::Client,
    cache: Mutex<HashMap<u32, Option<Bug>>>,
}

static DEFAULT_TRACKER: Lazy<BugTracker> = Lazy::new(|| {
    BugTracker::new(Url::parse(DEFAULT_BUG_TRACKER_URL).expect("default tracker URL is valid"))
});

impl BugTracker {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide tracker for pulp.plan.io.
    pub fn global() -> &'static BugTracker {
        &DEFAULT_TRACKER
    }

    /// Fetches a bug, `None` when the tracker cannot be queried.
    pub async fn get_bug(&self, bug_id: u32) -> Option<Bug> {
        if let Some(cached) = self.cached(bug_id) {
            return cached;
        }
        let bug = match self.fetch_bug(bug_id).await {
            Ok(bug) => Some(bug),
            Err(e) => {
                warn!(bug_id, error = %e, "Cannot read bug from tracker");
                None
            }
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(bug_id, bug.clone());
        }
        bug
    }

    fn cached(&self, bug_id: u32) -> Option<Option<Bug>> {
        self.cache.lock().ok()?.get(&bug_id).cloned()
    }

    async fn fetch_bug(&self, bug_id: u32) -> Result<Bug, reqwest::Error> {
        let mut url = self.base_url.clone();
        url.set_path(&format!("issues/{bug_id}.json"));
        let response: RedmineIssueResponse = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.issue.into())
    }

    /// Whether tests affected by `bug_id` can run against `version`.
    ///
    /// An unreachable tracker counts as testable.
    pub async fn bug_is_testable(&self, bug_id: u32, version: &Version) -> bool {
        let Some(bug) = self.get_bug(bug_id).await else {
            warn!(bug_id, "Assuming bug is testable");
            return true;
        };
        let status = bug.status.as_str();
        if UNTESTABLE_STATUSES.contains(&status) {
            return false;
        }
        if !TESTABLE_STATUSES.contains(&status) {
            warn!(bug_id, status, "Unknown bug status, treating bug as untestable");
            return false;
        }
        match &bug.target_platform_release {
            Some(target) => version >= target,
            None => true,
        }
    }

    pub async fn bug_is_untestable(&self, bug_id: u32, version: &Version) -> bool {
        !self.bug_is_testable(bug_id, version).await
    }

    /// Skips while `bug_id` affects the configured Pulp version.
    pub async fn skip_if_untestable(&self, bug_id: u32, cfg: &Config) -> Result<(), Skip> {
        if self.bug_is_untestable(bug_id, &cfg.pulp.version).await {
            let mut url = self.base_url.clone();
            url.set_path(&format!("issues/{bug_id}"));
            return Err(Skip::new(url.to_string()));
        }
        Ok(())
    }
}
