use once_cell::sync::Lazy;
use std::path::PathBuf;

/// Environment variable pointing at an explicit settings file.
pub const CONFIG_FILE_ENV: &str = "PULP_SMASH_CONFIG_FILE";

const APP_DIR: &str = "pulp-smash";
const SETTINGS_FILE: &str = "settings.yml";

static DEFAULT_DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::data_local_dir()
        .map(|p| p.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("~/.local/share/pulp-smash"))
});

// Fallback only, get_config_dir checks XDG_CONFIG_HOME first
static DEFAULT_CONFIG_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::config_dir()
        .map(|p| p.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("~/.config/pulp-smash"))
});

pub fn get_config_dir() -> PathBuf {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home).join(APP_DIR)
    } else {
        DEFAULT_CONFIG_DIR.clone()
    }
}

/// Path of the settings file to load.
///
/// `PULP_SMASH_CONFIG_FILE` wins over the per-user config directory.
pub fn get_config_path() -> PathBuf {
    match std::env::var(CONFIG_FILE_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => get_config_dir().join(SETTINGS_FILE),
    }
}

pub fn get_data_dir() -> std::io::Result<PathBuf> {
    let path = if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data_home).join(APP_DIR)
    } else {
        DEFAULT_DATA_DIR.clone()
    };
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

pub fn get_default_config() -> String {
    include_str!("../data/settings.yml").to_string()
}
