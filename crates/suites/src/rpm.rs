//! RPM repositories and repository groups (Pulp 2 API).
use anyhow::Result;
use serde_json::{Value, json};
use smash_core::{
    config::Config,
    constants::REPOSITORY_GROUP_PATH,
    crud::{CrudCase, UpdateStyle},
    selectors::Skip,
    utils::uuid4,
};

use crate::require_plugin;

pub const RPM_TYPE_ID: &str = "rpm";

/// Skips every RPM test when the RPM plugin is missing.
pub async fn set_up_module(cfg: &Config) -> Result<Option<Skip>> {
    require_plugin(cfg, RPM_TYPE_ID).await
}

/// A semi-random body for creating an RPM repository.
pub fn gen_repo() -> Value {
    json!({
        "id": uuid4(),
        "importer_config": {},
        "importer_type_id": "yum_importer",
        "notes": {"_repo-type": "rpm-repo"},
    })
}

/// A semi-random body for creating a repository group.
pub fn gen_repo_group() -> Value {
    json!({
        "id": uuid4(),
        "display_name": uuid4(),
        "description": uuid4(),
    })
}

/// A semi-random body for attaching a yum distributor.
pub fn gen_distributor() -> Value {
    json!({
        "auto_publish": false,
        "distributor_id": uuid4(),
        "distributor_type_id": "yum_distributor",
        "distributor_config": {
            "http": false,
            "https": true,
            "relative_url": uuid4(),
        },
    })
}

/// A minimal RPM repository.
pub struct RpmRepoCrud;

impl CrudCase for RpmRepoCrud {
    fn create_body(&self) -> Value {
        gen_repo()
    }

    fn update_body(&self) -> Value {
        json!({"delta": {"display_name": uuid4()}})
    }
}

/// An RPM repository whose importer has a feed URL.
pub struct RpmRepoWithFeedCrud;

impl CrudCase for RpmRepoWithFeedCrud {
    fn create_body(&self) -> Value {
        let mut body = RpmRepoCrud.create_body();
        body["importer_config"] = json!({"feed": uuid4()});
        body
    }

    fn update_body(&self) -> Value {
        RpmRepoCrud.update_body()
    }
}

/// A minimal repository group.
pub struct RepoGroupCrud;

impl CrudCase for RepoGroupCrud {
    fn path(&self) -> &str {
        REPOSITORY_GROUP_PATH
    }

    fn create_body(&self) -> Value {
        gen_repo_group()
    }

    fn update_body(&self) -> Value {
        json!({"display_name": uuid4()})
    }

    fn update_style(&self) -> UpdateStyle {
        UpdateStyle::Flat
    }
}
