use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::{
    assets::{get_config_path, get_default_config},
    version::Version,
};

#[derive(Error, Debug)]
pub enum SmashConfigError {
    #[error("File system error: {0}")]
    IO(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    YAMLError(#[from] serde_yaml::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// HTTP basic credentials for the Pulp API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PulpConfig {
    pub auth: Auth,
    pub version: Version,
    pub selinux_enabled: bool,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_verify() -> bool {
    true
}

fn default_selinux_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiRole {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_verify")]
    pub verify: bool,
}

impl Default for ApiRole {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            port: None,
            verify: default_verify(),
        }
    }
}

/// Parsed for completeness, nothing executes commands on a system.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShellRole {
    #[serde(default)]
    pub transport: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Api,
    Shell,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Roles {
    #[serde(default)]
    pub api: Option<ApiRole>,
    #[serde(default)]
    pub shell: Option<ShellRole>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SystemConfig {
    pub hostname: String,
    #[serde(default)]
    pub roles: Roles,
}

impl SystemConfig {
    pub fn has_role(&self, role: Role) -> bool {
        match role {
            Role::Api => self.roles.api.is_some(),
            Role::Shell => self.roles.shell.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_settle_delay_secs() -> u64 {
    5
}

fn default_task_timeout_secs() -> u64 {
    1800
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: default_settle_delay_secs(),
            task_timeout_secs: default_task_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Description of the Pulp deployment under test.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub pulp: PulpConfig,
    pub systems: Vec<SystemConfig>,
    pub timing: TimingConfig,
}

#[derive(Deserialize, Debug)]
struct RawPulpConfig {
    auth: Vec<String>,
    version: Version,
    #[serde(default = "default_selinux_enabled")]
    selinux_enabled: bool,
}

#[derive(Deserialize, Debug)]
struct RawConfig {
    pulp: RawPulpConfig,
    #[serde(default)]
    systems: Vec<SystemConfig>,
    #[serde(default)]
    timing: TimingConfig,
}

impl RawConfig {
    #[instrument]
    fn to_config(&self) -> Result<Config, SmashConfigError> {
        let auth = match self.pulp.auth.as_slice() {
            [username, password] => Auth {
                username: username.clone(),
                password: password.clone(),
            },
            other => {
                return Err(SmashConfigError::Config(format!(
                    "pulp.auth must be [username, password], got {} item(s)",
                    other.len()
                )));
            }
        };

        if self.systems.is_empty() {
            return Err(SmashConfigError::Config(
                "At least one system must be defined".to_string(),
            ));
        }
        if let Some(system) = self.systems.iter().find(|s| s.hostname.is_empty()) {
            return Err(SmashConfigError::Config(format!(
                "System with roles {:?} has an empty hostname",
                system.roles
            )));
        }
        if !self.systems.iter().any(|s| s.has_role(Role::Api)) {
            return Err(SmashConfigError::Config(
                "No system has the 'api' role".to_string(),
            ));
        }

        Ok(Config {
            pulp: PulpConfig {
                auth,
                version: self.pulp.version.clone(),
                selinux_enabled: self.pulp.selinux_enabled,
            },
            systems: self.systems.clone(),
            timing: self.timing.clone(),
        })
    }
}

impl Config {
    pub fn from_yaml(content: &str) -> Result<Self, SmashConfigError> {
        let raw: RawConfig = serde_yaml::from_str(content)?;
        raw.to_config()
    }

    /// Systems fulfilling `role`, in declaration order.
    pub fn get_systems(&self, role: Role) -> Vec<&SystemConfig> {
        self.systems.iter().filter(|s| s.has_role(role)).collect()
    }

    /// The system serving the REST API.
    pub fn api_system(&self) -> Result<&SystemConfig, SmashConfigError> {
        self.get_systems(Role::Api)
            .into_iter()
            .next()
            .ok_or_else(|| SmashConfigError::Config("No system has the 'api' role".to_string()))
    }

    /// Root URL of a system's API, e.g. `https://pulp.example.com/`.
    pub fn get_base_url(&self, system: &SystemConfig) -> Result<Url, SmashConfigError> {
        let api = system.roles.api.clone().unwrap_or_default();
        let text = match api.port {
            Some(port) => format!("{}://{}:{}/", api.scheme, system.hostname, port),
            None => format!("{}://{}/", api.scheme, system.hostname),
        };
        Url::parse(&text)
            .map_err(|e| SmashConfigError::Config(format!("Invalid base URL '{text}': {e}")))
    }

    pub fn api_base_url(&self) -> Result<Url, SmashConfigError> {
        self.get_base_url(self.api_system()?)
    }

    /// Whether TLS certificates of the API system are verified.
    pub fn verify_tls(&self) -> bool {
        self.api_system()
            .ok()
            .and_then(|s| s.roles.api.as_ref())
            .map(|api| api.verify)
            .unwrap_or(true)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.timing.settle_delay_secs)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.task_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.timing.poll_interval_ms)
    }
}

#[instrument(skip(config_path))]
pub fn create_or_get_config_file(
    config_path: Option<PathBuf>,
) -> Result<(bool, PathBuf), SmashConfigError> {
    let actual_path = config_path.unwrap_or_else(get_config_path);

    let parent_dir = actual_path.parent().ok_or_else(|| {
        SmashConfigError::IO(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Config path has no parent directory",
        ))
    })?;

    if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
        fs::create_dir_all(parent_dir)?;
    }

    if actual_path.exists() {
        Ok((true, actual_path))
    } else {
        File::create(&actual_path)?.write_all(get_default_config().as_bytes())?;
        Ok((false, actual_path))
    }
}

/// Reads settings from an existing file without creating it.
#[instrument]
pub fn read_config(config_path: &Path) -> Result<Config, SmashConfigError> {
    let content = fs::read_to_string(config_path)?;
    Config::from_yaml(&content)
}

#[instrument(skip(config_path))]
pub fn get_config(config_path: Option<PathBuf>) -> Result<Config, SmashConfigError> {
    let (_, config_file) = create_or_get_config_file(config_path)?;
    read_config(&config_file)
}
