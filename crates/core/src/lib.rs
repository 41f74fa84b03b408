mod assets;

pub mod api;
pub mod config;
pub mod constants;
pub mod crud;
pub mod selectors;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::assets::{CONFIG_FILE_ENV, get_config_dir, get_config_path, get_data_dir, get_default_config};
