//! pulp-smash cli definition and entrypoint.
mod settings;
mod status;
pub mod ux;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smash_core::{config::get_config, get_config_path};

use crate::log::setup_logging;

/// pulp-smash - functional tests for the Pulp REST API.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file to use instead of the default location.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Show verbose logs.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the settings file describing the server under test.
    Settings {
        #[command(subcommand)]
        action: settings::SettingsAction,
    },
    /// Query the status endpoint of the configured server.
    Status,
}

/// Resolves `--config`, expanding `~` and environment variables.
fn resolve_config_path(config: Option<&str>) -> Result<PathBuf> {
    match config {
        Some(raw) => {
            let expanded = shellexpand::full(raw)
                .with_context(|| format!("Failed to expand config path '{raw}'"))?;
            Ok(PathBuf::from(expanded.as_ref()))
        }
        None => Ok(get_config_path()),
    }
}

/// Runs the main CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        setup_logging().context("Failed to set up logging")?;
    }

    let config_path = resolve_config_path(cli.config.as_deref())?;
    let mut stdout = std::io::stdout();

    match &cli.command {
        Commands::Settings { action } => settings::execute(action, &config_path, &mut stdout),
        Commands::Status => {
            let config =
                get_config(Some(config_path)).context("Failed to load configuration")?;
            status::execute(&config, &mut stdout).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_settings_subcommand_with_global_config() {
        let cli = Cli::try_parse_from([
            "pulp-smash",
            "settings",
            "validate",
            "--config",
            "/tmp/settings.yml",
        ])
        .unwrap();

        assert_eq!(cli.config.as_deref(), Some("/tmp/settings.yml"));
        assert!(matches!(
            cli.command,
            Commands::Settings {
                action: settings::SettingsAction::Validate
            }
        ));
    }

    #[test]
    fn test_resolve_config_path_expands_env() {
        unsafe {
            std::env::set_var("SMASH_TEST_DIR", "/srv/pulp");
        }
        let path = resolve_config_path(Some("$SMASH_TEST_DIR/settings.yml")).unwrap();
        assert_eq!(path, PathBuf::from("/srv/pulp/settings.yml"));
        unsafe {
            std::env::remove_var("SMASH_TEST_DIR");
        }
    }

    #[test]
    fn test_resolve_config_path_unknown_variable() {
        assert!(resolve_config_path(Some("$SMASH_SURELY_UNSET_VAR/x.yml")).is_err());
    }
}
