//! Puppet repositories (Pulp 2 API).
use anyhow::Result;
use serde_json::{Value, json};
use smash_core::{config::Config, crud::CrudCase, selectors::Skip, utils::uuid4};

use crate::require_plugin;

pub const PUPPET_TYPE_ID: &str = "puppet_module";

pub async fn set_up_module(cfg: &Config) -> Result<Option<Skip>> {
    require_plugin(cfg, PUPPET_TYPE_ID).await
}

/// A semi-random body for creating a Puppet repository.
pub fn gen_repo() -> Value {
    json!({
        "id": uuid4(),
        "importer_config": {},
        "importer_type_id": "puppet_importer",
        "notes": {"_repo-type": "puppet-repo"},
    })
}

/// A semi-random body for creating a Puppet distributor.
pub fn gen_distributor() -> Value {
    json!({
        "auto_publish": false,
        "distributor_config": {"serve_http": true, "serve_https": true},
        "distributor_id": uuid4(),
        "distributor_type_id": "puppet_distributor",
    })
}

/// A Puppet repository created together with one distributor.
pub fn gen_repo_with_distributor() -> Value {
    let mut body = gen_repo();
    body["distributors"] = json!([gen_distributor()]);
    body
}

/// Ids of the distributors listed in a detailed repository read.
pub fn distributor_ids(repo: &Value) -> Vec<String> {
    repo["distributors"]
        .as_array()
        .map(|distributors| {
            distributors
                .iter()
                .filter_map(|d| d["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// A minimal Puppet repository.
pub struct PuppetRepoCrud;

impl CrudCase for PuppetRepoCrud {
    fn create_body(&self) -> Value {
        gen_repo()
    }

    fn update_body(&self) -> Value {
        json!({"delta": {"description": uuid4()}})
    }
}
