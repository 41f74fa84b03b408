//! Well-known paths of the Pulp REST API.

/// Pulp 2 repositories collection.
pub const REPOSITORY_PATH: &str = "/pulp/api/v2/repositories/";

/// Pulp 2 repository groups collection.
pub const REPOSITORY_GROUP_PATH: &str = "/pulp/api/v2/repo_groups/";

/// Pulp 2 tasks collection; spawned task hrefs live below it.
pub const TASKS_PATH: &str = "/pulp/api/v2/tasks/";

pub const PLUGIN_TYPES_PATH: &str = "/pulp/api/v2/plugins/types/";

pub const STATUS_PATH: &str = "/pulp/api/v2/status/";

/// Task states after which a Pulp 2 task will not change any more.
pub const TASK_FINISHED_STATES: [&str; 4] = ["finished", "error", "canceled", "skipped"];
