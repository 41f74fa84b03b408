//! Repository lifecycle against the Pulp 3 core API.
use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use smash_core::{
    api::{ApiError, Client, CodeHandler},
    config::Config,
    selectors::{Skip, skip_if_unset},
    utils::{settle, uuid4},
};
use tracing::info;

use super::{REPO_PATH, adjust_url, gen_repo, get_auth, get_base_url};

/// Bug that breaks renaming repositories.
pub const RENAME_BUG: u32 = 3101;

/// Walks one repository through create, read, update and delete.
///
/// The repository created first is shared by every later step.
pub struct RepoCrud {
    cfg: Config,
    client: Client,
    repo: Option<Value>,
}

impl RepoCrud {
    pub fn new(cfg: &Config) -> Result<Self> {
        let base_url = adjust_url(&get_base_url(cfg)?)?;
        let client = Client::with_handler(cfg, CodeHandler)?
            .with_base_url(base_url)
            .with_auth(Some(get_auth(cfg)));
        Ok(Self::with_client(cfg, client))
    }

    pub fn with_client(cfg: &Config, client: Client) -> Self {
        Self {
            cfg: cfg.clone(),
            client,
            repo: None,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The repository created by [`create_repo`](Self::create_repo).
    pub fn repo(&self) -> Result<&Value, Skip> {
        skip_if_unset(self.repo.as_ref(), "repo")
    }

    fn repo_href(&self) -> Result<String> {
        let repo = self.repo.as_ref().context("No repository has been created")?;
        repo["_href"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Repository has no '_href': {repo}"))
    }

    pub async fn create_repo(&mut self) -> Result<&Value> {
        let repo = self
            .client
            .post(REPO_PATH, &gen_repo())
            .await
            .context("Failed to create repository")?
            .json()?;
        info!(href = %repo["_href"], "Created repository");
        Ok(self.repo.insert(repo))
    }

    /// Reads the repository by its href.
    pub async fn read_repo(&self) -> Result<Value> {
        let href = self.repo_href()?;
        Ok(self.client.get(&href).await?.json()?)
    }

    /// Searches repositories by name, returning the page's results.
    pub async fn search_repos(&self, name: &str) -> Result<Vec<Value>> {
        let page = self
            .client
            .get_with_query(REPO_PATH, &[("name", name)])
            .await?
            .json()?;
        page["results"]
            .as_array()
            .cloned()
            .ok_or_else(|| anyhow!("Search response has no 'results': {page}"))
    }

    /// Sets `attr` to a fresh value with PUT, sending the whole repository.
    ///
    /// Returns the value sent and the repository as read back afterwards.
    pub async fn fully_update_attr(&self, attr: &str) -> Result<(String, Value)> {
        let mut repo = self.read_repo().await?;
        let value = uuid4();
        repo[attr] = json!(value);
        let href = self.repo_href()?;
        self.client
            .put(&href, &repo)
            .await
            .with_context(|| format!("Failed to update '{attr}' with PUT"))?;
        settle(&self.cfg).await;

        Ok((value, self.read_repo().await?))
    }

    /// Sets `attr` to a fresh value with PATCH, sending only that attribute.
    pub async fn partially_update_attr(&self, attr: &str) -> Result<(String, Value)> {
        let value = uuid4();
        let href = self.repo_href()?;
        self.client
            .patch(&href, &json!({ attr: value }))
            .await
            .with_context(|| format!("Failed to update '{attr}' with PATCH"))?;
        settle(&self.cfg).await;

        Ok((value, self.read_repo().await?))
    }

    pub async fn delete_repo(&self) -> Result<()> {
        let href = self.repo_href()?;
        self.client
            .delete(&href)
            .await
            .context("Failed to delete repository")?;
        settle(&self.cfg).await;
        Ok(())
    }

    /// Whether reading the repository now fails with an HTTP error status.
    pub async fn repo_is_gone(&self) -> Result<bool> {
        let href = self.repo_href()?;
        match self.client.get(&href).await {
            Ok(_) => Ok(false),
            Err(ApiError::Status { .. }) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }
}
