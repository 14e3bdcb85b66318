//! Doctor command - verify the configured caption source and its prerequisites.

use crate::cli::Output;
use crate::config::{Settings, SourceKind};
use console::style;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
///
/// `config_path` is the `--config` override, if any.
pub async fn run_doctor(settings: &Settings, config_path: Option<&Path>) -> anyhow::Result<()> {
    Output::header("ytscribe Doctor");
    println!();
    println!("Checking configuration and caption source prerequisites...\n");

    let mut checks = Vec::new();

    println!("{}", style("Configuration").bold());
    let config_checks = vec![
        check_config_file(config_path),
        CheckResult::ok("Caption source", &settings.source.kind.to_string()),
        CheckResult::ok(
            "Retry policy",
            &format!(
                "{} attempts, {}ms base delay, x{} backoff, {}s per attempt",
                settings.retry.max_attempts,
                settings.retry.base_delay_ms,
                settings.retry.backoff_multiplier,
                settings.attempt_timeout().as_secs()
            ),
        ),
    ];
    for check in &config_checks {
        check.print();
    }
    checks.extend(config_checks);

    println!();

    println!("{}", style("Source Prerequisites").bold());
    let source_checks = check_source(settings).await;
    for check in &source_checks {
        check.print();
    }
    checks.extend(source_checks);

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before serving transcripts.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! ytscribe is ready to serve.");
    }

    Ok(())
}

async fn check_source(settings: &Settings) -> Vec<CheckResult> {
    match settings.source.kind {
        SourceKind::WatchPage | SourceKind::Innertube => {
            vec![check_endpoint("YouTube", &settings.youtube.base_url).await]
        }
        SourceKind::Ytdlp => vec![
            check_tool("yt-dlp", &settings.ytdlp_binary().to_string_lossy()),
            check_endpoint("YouTube", &settings.youtube.base_url).await,
        ],
        SourceKind::Webdriver => vec![check_webdriver(&settings.webdriver.url).await],
        SourceKind::Apify => vec![
            check_apify_token(settings.apify.token.as_deref()),
            check_endpoint("Apify API", &settings.apify.base_url).await,
        ],
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str, binary: &str) -> CheckResult {
    match Command::new(binary).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            CheckResult::ok(name, &version)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", install_hint_ytdlp()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, &format!("not found at {}", binary), install_hint_ytdlp())
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), install_hint_ytdlp()),
    }
}

/// Check that an HTTP endpoint answers at all.
async fn check_endpoint(name: &str, url: &str) -> CheckResult {
    let client = match reqwest::Client::builder().timeout(CHECK_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => return CheckResult::error(name, &format!("client error: {}", e), "Check TLS setup"),
    };
    match client.get(url).send().await {
        Ok(resp) => CheckResult::ok(name, &format!("{} ({})", url, resp.status())),
        Err(e) => CheckResult::warning(
            name,
            &format!("{} unreachable: {}", url, e),
            "Check network access from this host",
        ),
    }
}

/// Check that the WebDriver endpoint reports ready.
async fn check_webdriver(url: &str) -> CheckResult {
    const NAME: &str = "WebDriver";
    const HINT: &str = "Start chromedriver (e.g. `chromedriver --port=9515`) or set WEBDRIVER_URL";

    let client = match reqwest::Client::builder().timeout(CHECK_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => return CheckResult::error(NAME, &format!("client error: {}", e), HINT),
    };
    let status_url = format!("{}/status", url.trim_end_matches('/'));
    let body: serde_json::Value = match client.get(&status_url).send().await {
        Ok(resp) => match resp.json().await {
            Ok(body) => body,
            Err(e) => return CheckResult::error(NAME, &format!("invalid status reply: {}", e), HINT),
        },
        Err(e) => return CheckResult::error(NAME, &format!("{} unreachable: {}", url, e), HINT),
    };

    if body["value"]["ready"].as_bool().unwrap_or(false) {
        CheckResult::ok(NAME, &format!("{} ready", url))
    } else {
        CheckResult::warning(NAME, &format!("{} reachable but not ready", url), HINT)
    }
}

/// Check the Apify token without revealing it.
fn check_apify_token(token: Option<&str>) -> CheckResult {
    match token {
        Some(t) if t.chars().count() > 12 => {
            CheckResult::ok("APIFY_TOKEN", &format!("configured ({})", mask_token(t)))
        }
        Some(t) if t.is_empty() => CheckResult::error(
            "APIFY_TOKEN",
            "empty",
            "Set with: export APIFY_TOKEN='apify_api_...'",
        ),
        Some(_) => CheckResult::warning(
            "APIFY_TOKEN",
            "set but looks too short",
            "Copy the personal API token from the Apify console",
        ),
        None => CheckResult::error(
            "APIFY_TOKEN",
            "not set",
            "Set with: export APIFY_TOKEN='apify_api_...'",
        ),
    }
}

/// Keep the first 6 and last 4 characters of a secret.
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let head: String = chars.iter().take(6).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check if the config file in use exists.
fn check_config_file(path: Option<&Path>) -> CheckResult {
    let config_path = path.map_or_else(Settings::default_config_path, Path::to_path_buf);
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: ytscribe config init",
        )
    }
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption_source::test_support::serve;
    use axum::{routing::get, Json, Router};

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_apify_token_is_masked() {
        let result = check_apify_token(Some("apify_api_abcdefghijkl"));
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(!result.message.contains("abcdefgh"));

        assert_eq!(check_apify_token(None).status, CheckStatus::Error);
        assert_eq!(check_apify_token(Some("")).status, CheckStatus::Error);
    }

    #[test]
    fn test_non_ascii_token_is_masked_by_character() {
        let result = check_apify_token(Some("ключ_апи_секретный_токен"));
        assert_eq!(result.status, CheckStatus::Ok);
        assert_eq!(mask_token("ключ_апи_секретный_токен"), "ключ_а...окен");
    }

    #[test]
    fn test_config_file_uses_override_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let missing = check_config_file(Some(&path));
        assert_eq!(missing.status, CheckStatus::Warning);

        std::fs::write(&path, "").unwrap();
        let found = check_config_file(Some(&path));
        assert_eq!(found.status, CheckStatus::Ok);
        assert_eq!(found.message, path.display().to_string());
    }

    #[test]
    fn test_missing_tool() {
        let result = check_tool("yt-dlp", "/nonexistent/ytscribe-test/yt-dlp");
        assert_eq!(result.status, CheckStatus::Error);
        assert!(result.message.starts_with("not found"));
    }

    #[tokio::test]
    async fn test_webdriver_ready() {
        let url = serve(Router::new().route(
            "/status",
            get(|| async { Json(serde_json::json!({"value": {"ready": true}})) }),
        ))
        .await;
        assert_eq!(check_webdriver(&url).await.status, CheckStatus::Ok);
    }

    #[tokio::test]
    async fn test_webdriver_not_ready() {
        let url = serve(Router::new().route(
            "/status",
            get(|| async { Json(serde_json::json!({"value": {"ready": false}})) }),
        ))
        .await;
        assert_eq!(check_webdriver(&url).await.status, CheckStatus::Warning);
    }
}
