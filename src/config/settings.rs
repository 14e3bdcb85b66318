//! Configuration settings for ytscribe.

use crate::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Slack on top of an apify run's wait and polling budget.
const APIFY_DEADLINE_HEADROOM: Duration = Duration::from_secs(30);

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub retry: RetrySettings,
    pub source: SourceSettings,
    pub youtube: YoutubeSettings,
    pub ytdlp: YtDlpSettings,
    pub webdriver: WebDriverSettings,
    pub apify: ApifySettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Deployment environment reported by `/health`.
    pub environment: String,
    /// Allowed CORS origins. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
            environment: "development".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Retry policy for upstream calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure, in milliseconds.
    pub base_delay_ms: u64,
    /// Growth factor applied per failed attempt.
    pub backoff_multiplier: f64,
    /// Deadline for a single attempt, in seconds.
    pub attempt_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            attempt_timeout_secs: 45,
        }
    }
}

/// Caption retrieval strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Scrape the captions JSON embedded in the watch page.
    #[default]
    WatchPage,
    /// Read caption URLs from `yt-dlp --dump-json`.
    Ytdlp,
    /// Drive a browser through a WebDriver endpoint.
    Webdriver,
    /// Call the InnerTube player endpoint and parse the timedtext XML.
    Innertube,
    /// Run a managed Apify actor.
    Apify,
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "watch_page" | "transcript" => Ok(SourceKind::WatchPage),
            "ytdlp" | "yt_dlp" => Ok(SourceKind::Ytdlp),
            "webdriver" | "browser" => Ok(SourceKind::Webdriver),
            "innertube" | "manifest" => Ok(SourceKind::Innertube),
            "apify" | "actor" => Ok(SourceKind::Apify),
            _ => Err(format!("Unknown caption source: {}", s)),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::WatchPage => write!(f, "watch_page"),
            SourceKind::Ytdlp => write!(f, "ytdlp"),
            SourceKind::Webdriver => write!(f, "webdriver"),
            SourceKind::Innertube => write!(f, "innertube"),
            SourceKind::Apify => write!(f, "apify"),
        }
    }
}

/// Settings shared by all caption sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Which strategy this deployment uses.
    pub kind: SourceKind,
    /// Preferred caption language.
    pub language: String,
    /// User-Agent sent to YouTube.
    pub user_agent: String,
    /// Timeout for individual HTTP requests, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::WatchPage,
            language: "en".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// YouTube endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeSettings {
    /// Base URL for watch pages and the InnerTube API.
    pub base_url: String,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
        }
    }
}

/// yt-dlp settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YtDlpSettings {
    /// Path or name of the yt-dlp binary.
    pub binary: String,
}

impl Default for YtDlpSettings {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
        }
    }
}

/// WebDriver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverSettings {
    /// WebDriver endpoint (chromedriver, geckodriver, selenium).
    pub url: String,
    /// Navigation timeout, in seconds.
    pub page_load_timeout_secs: u64,
    /// Run the browser without a window.
    pub headless: bool,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9515".to_string(),
            page_load_timeout_secs: 30,
            headless: true,
        }
    }
}

/// Apify actor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApifySettings {
    /// Apify API base URL.
    pub base_url: String,
    /// API token. Required when the apify source is selected.
    pub token: Option<String>,
    /// Actor to run, `user~name` or an actor ID.
    pub actor_id: String,
    /// Interval between status polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of status polls.
    pub max_polls: u32,
    /// Server-side wait requested when starting a run, in seconds.
    pub run_wait_secs: u64,
    /// Overall HTTP client timeout, in seconds.
    pub client_timeout_secs: u64,
}

impl ApifySettings {
    /// Longest a single run can legitimately take: the server-side wait on
    /// submit, the whole polling budget and time for the dataset download.
    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_wait_secs)
            + Duration::from_millis(self.poll_interval_ms.saturating_mul(u64::from(self.max_polls)))
            + APIFY_DEADLINE_HEADROOM
    }
}

impl Default for ApifySettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.apify.com".to_string(),
            token: None,
            actor_id: "pintostudio~youtube-transcript-scraper".to_string(),
            poll_interval_ms: 1000,
            max_polls: 30,
            run_wait_secs: 60,
            client_timeout_secs: 360,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment overrides are applied on top of the file.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ScribeError::Config(format!("Invalid PORT: {}", port)))?;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(env) = lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            self.server.environment = env;
        }
        if let Some(kind) = lookup("YTSCRIBE_SOURCE") {
            self.source.kind = kind.parse().map_err(ScribeError::Config)?;
        }
        if let Some(token) = lookup("APIFY_TOKEN") {
            self.apify.token = Some(token);
        }
        if let Some(url) = lookup("WEBDRIVER_URL") {
            self.webdriver.url = url;
        }
        Ok(())
    }

    /// Deadline for one retrieval attempt.
    ///
    /// Sources with their own run deadline (apify) get at least that long, so
    /// a run still in progress is never cut off and resubmitted.
    pub fn attempt_timeout(&self) -> Duration {
        let configured = Duration::from_secs(self.retry.attempt_timeout_secs);
        match self.source.kind {
            SourceKind::Apify => configured.max(self.apify.run_deadline()),
            _ => configured,
        }
    }

    /// Reject settings that cannot produce a working deployment.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(ScribeError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.retry.backoff_multiplier.is_finite() && self.retry.backoff_multiplier > 0.0) {
            return Err(ScribeError::Config(
                "retry.backoff_multiplier must be a positive number".to_string(),
            ));
        }
        if self.source.kind == SourceKind::Apify
            && self.apify.token.as_deref().is_none_or(str::is_empty)
        {
            return Err(ScribeError::Config(
                "apify.token (or APIFY_TOKEN) is required for the apify source".to_string(),
            ));
        }
        if self.retry.attempt_timeout_secs == 0 {
            return Err(ScribeError::Config(
                "retry.attempt_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.source.kind == SourceKind::Apify
            && self.apify.client_timeout_secs <= self.apify.run_wait_secs
        {
            return Err(ScribeError::Config(format!(
                "apify.client_timeout_secs ({}) must exceed apify.run_wait_secs ({})",
                self.apify.client_timeout_secs, self.apify.run_wait_secs
            )));
        }
        for (key, value) in [
            ("youtube.base_url", &self.youtube.base_url),
            ("webdriver.url", &self.webdriver.url),
            ("apify.base_url", &self.apify.base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ScribeError::Config(format!("Invalid {}: {} ({})", key, value, e)))?;
        }
        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ScribeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ytscribe")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded yt-dlp binary path.
    pub fn ytdlp_binary(&self) -> PathBuf {
        Self::expand_path(&self.ytdlp.binary)
    }
}
