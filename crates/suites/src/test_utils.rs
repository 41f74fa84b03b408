//! Test utilities for smash-suites.

use serde_json::{Value, json};

pub use smash_core::test_utils::mock_config;

/// Content types reported by `/pulp/api/v2/plugins/types/`.
pub fn plugin_types(ids: &[&str]) -> Value {
    Value::Array(ids.iter().map(|id| json!({"id": id})).collect())
}
