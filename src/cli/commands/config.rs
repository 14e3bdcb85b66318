//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command.
///
/// `path` is the `--config` override; the default location is used otherwise.
pub fn run_config(action: &ConfigAction, path: Option<PathBuf>) -> Result<()> {
    let config_path = path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let settings = Settings::load_from(Some(&config_path))?;
            println!("{}", render(&settings)?);
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }

        ConfigAction::Init { force } => {
            if init(&config_path, *force)? {
                Output::success(&format!("Created default config at {}", config_path.display()));
            } else {
                Output::warning(&format!(
                    "Config already exists at {} (use --force to overwrite)",
                    config_path.display()
                ));
            }
        }
    }

    Ok(())
}

/// Render settings as TOML with the Apify token masked.
fn render(settings: &Settings) -> Result<String> {
    let mut shown = settings.clone();
    if shown.apify.token.is_some() {
        shown.apify.token = Some("********".to_string());
    }
    toml::to_string_pretty(&shown).map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))
}

/// Write the default settings; returns false if a file exists and `force` is unset.
fn init(path: &PathBuf, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    Settings::default().save_to(path)?;
    Ok(true)
}
