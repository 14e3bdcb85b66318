//! Pre-flight checks before fetching.
//!
//! Validates that the tools and credentials the configured caption source
//! needs are available before a fetch would otherwise fail on every retry.

use crate::config::{Settings, SourceKind};
use crate::error::{Result, ScribeError};
use std::path::Path;
use std::process::Command;

/// Run pre-flight checks for the configured source.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(settings: &Settings) -> Result<()> {
    match settings.source.kind {
        SourceKind::Ytdlp => check_tool(&settings.ytdlp_binary())?,
        SourceKind::Apify => check_apify_token(settings)?,
        // Remote endpoints; reachability is reported by `doctor`
        SourceKind::WatchPage | SourceKind::Innertube | SourceKind::Webdriver => {}
    }
    Ok(())
}

/// Check that an Apify token is configured.
fn check_apify_token(settings: &Settings) -> Result<()> {
    match settings.apify.token.as_deref() {
        Some(token) if !token.is_empty() => Ok(()),
        Some(_) => Err(ScribeError::Config(
            "APIFY_TOKEN is empty. Set it with: export APIFY_TOKEN='apify_api_...'".to_string(),
        )),
        None => Err(ScribeError::Config(
            "APIFY_TOKEN not set. Set it with: export APIFY_TOKEN='apify_api_...'".to_string(),
        )),
    }
}

/// Check if an external tool is available.
pub(crate) fn check_tool(binary: &Path) -> Result<()> {
    match Command::new(binary).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(ScribeError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            binary.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ScribeError::ToolNotFound(binary.display().to_string()))
        }
        Err(e) => Err(ScribeError::ToolNotFound(format!("{}: {}", binary.display(), e))),
    }
}
