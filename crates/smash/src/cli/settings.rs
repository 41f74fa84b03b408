use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use smash_core::config::{create_or_get_config_file, read_config};

use crate::cli::ux::{MessageType, style_text};

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the path of the settings file.
    Path,
    /// Print the settings, with defaults filled in.
    Show,
    /// Write a default settings file.
    Create {
        /// Overwrite an existing settings file.
        #[arg(long)]
        force: bool,
    },
    /// Check that the settings file is valid.
    Validate,
}

pub fn execute(action: &SettingsAction, path: &Path, out: &mut impl Write) -> Result<()> {
    match action {
        SettingsAction::Path => {
            writeln!(out, "{}", path.display())?;
        }
        SettingsAction::Show => {
            let config = read_config(path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            let yaml = serde_yaml::to_string(&config).context("Failed to serialize settings")?;
            write!(out, "{yaml}")?;
        }
        SettingsAction::Create { force } => {
            if path.exists() {
                if !force {
                    bail!(
                        "Settings file {} already exists, use --force to overwrite it",
                        path.display()
                    );
                }
                fs::remove_file(path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
            let (_, created) = create_or_get_config_file(Some(path.to_path_buf()))?;
            let message = format!("Created {}", created.display());
            writeln!(out, "{}", style_text(&message, MessageType::Success))?;
        }
        SettingsAction::Validate => {
            read_config(path)
                .with_context(|| format!("Invalid settings in {}", path.display()))?;
            let message = format!("{} is valid", path.display());
            writeln!(out, "{}", style_text(&message, MessageType::Success))?;
        }
    }
    Ok(())
}
