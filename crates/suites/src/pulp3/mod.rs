//! Pulp 3 helpers.
//!
//! Pulp 3 serves its API on port 8000 of the API system, independently of
//! the scheme and port configured for Pulp 2.
use anyhow::{Context, Result};
use serde_json::{Value, json};
use smash_core::{
    config::{Auth, Config},
    selectors::{Skip, require},
    utils::uuid4,
};
use url::Url;

pub mod pulpcore;

pub const REPO_PATH: &str = "/pulp/api/v3/repositories/";

pub const API_PORT: u16 = 8000;

/// Skips unless Pulp 3 or later is under test.
pub fn require_pulp3(cfg: &Config) -> Result<(), Skip> {
    require(cfg, "3")
}

pub fn get_auth(cfg: &Config) -> Auth {
    cfg.pulp.auth.clone()
}

pub fn get_base_url(cfg: &Config) -> Result<Url> {
    cfg.api_base_url().context("Failed to build the Pulp base URL")
}

/// Keeps scheme and host of `url`, moving it to the Pulp 3 port.
pub fn adjust_url(url: &Url) -> Result<Url> {
    let host = url
        .host_str()
        .with_context(|| format!("URL '{url}' has no host"))?;
    let text = format!("{}://{}:{}/", url.scheme(), host, API_PORT);
    Url::parse(&text).with_context(|| format!("Invalid Pulp 3 URL '{text}'"))
}

/// A semi-random body for creating a Pulp 3 repository.
pub fn gen_repo() -> Value {
    json!({
        "name": uuid4(),
        "description": uuid4(),
    })
}
