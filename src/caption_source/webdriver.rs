//! Browser automation source over the W3C WebDriver protocol.
//!
//! The driver handle is shared by the whole process and initialized at most
//! once, on first use. Every request opens its own browser session and
//! deletes it on every exit path.

use super::tracks::PlayerResponse;
use super::{fetch_timedtext, select_track, youtube_client, CaptionSource, SourceKind};
use crate::config::{Settings, WebDriverSettings};
use crate::error::{FetchError, Result};
use crate::transcript::{RawSegment, VideoId};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Reads the player response and captcha marker from the loaded page.
const SCRAPE_SCRIPT: &str = r#"
const r = window.ytInitialPlayerResponse;
return JSON.stringify({
    captcha: !!document.querySelector('.g-recaptcha'),
    player: r ? { playabilityStatus: r.playabilityStatus, captions: r.captions } : null
});
"#;

#[derive(Debug, Deserialize)]
struct ScrapeResult {
    #[serde(default)]
    captcha: bool,
    player: Option<PlayerResponse>,
}

#[derive(Debug, Deserialize)]
struct DriverStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Process-wide connection to the WebDriver endpoint.
#[derive(Clone)]
struct DriverHandle {
    client: reqwest::Client,
    url: String,
}

impl DriverHandle {
    async fn connect(settings: &WebDriverSettings) -> std::result::Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.page_load_timeout_secs + 15))
            .build()
            .map_err(|e| FetchError::transport(format!("Failed to build WebDriver client: {e}")))?;

        let handle = Self {
            client,
            url: settings.url.trim_end_matches('/').to_string(),
        };

        let status: DriverStatus = handle.command(Method::GET, "/status", None).await?;
        if !status.ready {
            return Err(FetchError::transport(format!(
                "WebDriver at {} is not ready: {}",
                handle.url, status.message
            )));
        }

        info!("Connected to WebDriver at {}", handle.url);
        Ok(handle)
    }

    /// Send a WebDriver command and decode its `value`.
    async fn command<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> std::result::Result<T, FetchError> {
        let mut request = self.client.request(method, format!("{}{}", self.url, path));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let mut payload: Value = response.json().await?;
        let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(classify_driver_error(&value));
        }

        Ok(serde_json::from_value(value)?)
    }

    async fn new_session(
        &self,
        settings: &WebDriverSettings,
        language: &str,
    ) -> std::result::Result<BrowserSession, FetchError> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!("--lang={language}"),
        ];
        if settings.headless {
            args.push("--headless=new".to_string());
        }

        let page_load_ms = settings.page_load_timeout_secs * 1000;
        let body = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args },
                    "timeouts": { "pageLoad": page_load_ms, "script": page_load_ms }
                }
            }
        });

        let session: NewSession = self.command(Method::POST, "/session", Some(body)).await?;
        debug!("Opened browser session {}", session.session_id);

        Ok(BrowserSession {
            driver: self.clone(),
            id: session.session_id,
            closed: false,
        })
    }

    async fn delete_session(&self, id: &str) -> std::result::Result<(), FetchError> {
        let _: Value = self
            .command(Method::DELETE, &format!("/session/{id}"), None)
            .await?;
        Ok(())
    }
}

fn classify_driver_error(value: &Value) -> FetchError {
    let error = value["error"].as_str().unwrap_or("unknown error");
    let message = value["message"].as_str().unwrap_or_default();
    match error {
        "timeout" | "script timeout" => {
            FetchError::timeout(format!("WebDriver {error}: {message}"))
        }
        _ => FetchError::transport(format!("WebDriver {error}: {message}")),
    }
}

/// One browser session, deleted when the request is done with it.
struct BrowserSession {
    driver: DriverHandle,
    id: String,
    closed: bool,
}

impl BrowserSession {
    async fn navigate(&self, url: &str) -> std::result::Result<(), FetchError> {
        let _: Value = self
            .driver
            .command(
                Method::POST,
                &format!("/session/{}/url", self.id),
                Some(json!({ "url": url })),
            )
            .await?;
        Ok(())
    }

    async fn execute(&self, script: &str) -> std::result::Result<Value, FetchError> {
        self.driver
            .command(
                Method::POST,
                &format!("/session/{}/execute/sync", self.id),
                Some(json!({ "script": script, "args": [] })),
            )
            .await
    }

    async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.driver.delete_session(&self.id).await {
            warn!("Failed to close browser session {}: {}", self.id, e);
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Request future dropped mid-flight (timeout or disconnect)
        if self.closed {
            return;
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let driver = self.driver.clone();
            let id = std::mem::take(&mut self.id);
            runtime.spawn(async move {
                if let Err(e) = driver.delete_session(&id).await {
                    warn!("Failed to close abandoned browser session {}: {}", id, e);
                }
            });
        }
    }
}

/// Caption source that loads the watch page in a real browser.
pub struct WebDriverSource {
    settings: WebDriverSettings,
    driver: OnceCell<DriverHandle>,
    youtube: reqwest::Client,
    base_url: String,
    language: String,
}

impl WebDriverSource {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            settings: settings.webdriver.clone(),
            driver: OnceCell::new(),
            youtube: youtube_client(settings)?,
            base_url: settings.youtube.base_url.trim_end_matches('/').to_string(),
            language: settings.source.language.clone(),
        })
    }

    async fn driver(&self) -> std::result::Result<&DriverHandle, FetchError> {
        self.driver
            .get_or_try_init(|| DriverHandle::connect(&self.settings))
            .await
    }

    async fn scrape(
        &self,
        session: &BrowserSession,
        video_id: &VideoId,
    ) -> std::result::Result<ScrapeResult, FetchError> {
        let url = format!("{}/watch?v={}", self.base_url, video_id);
        debug!("Navigating to {}", url);
        session.navigate(&url).await?;

        let raw = session.execute(SCRAPE_SCRIPT).await?;
        let json = raw
            .as_str()
            .ok_or_else(|| FetchError::transport("Scrape script returned a non-string value"))?;
        Ok(serde_json::from_str(json)?)
    }
}

#[async_trait]
impl CaptionSource for WebDriverSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Webdriver
    }

    #[instrument(skip(self), fields(video_id = %video_id))]
    async fn retrieve(&self, video_id: &VideoId) -> std::result::Result<Vec<RawSegment>, FetchError> {
        let driver = self.driver().await?;
        let session = driver.new_session(&self.settings, &self.language).await?;

        let scraped = self.scrape(&session, video_id).await;
        session.close().await;
        let scraped = scraped?;

        if scraped.captcha {
            return Err(FetchError::rate_limited(
                "YouTube served a captcha to the browser session",
            ));
        }

        let player = scraped
            .player
            .ok_or_else(|| FetchError::transport("Watch page did not expose a player response"))?;
        let tracks = player.into_caption_tracks(video_id)?;

        let track = select_track(&tracks, &self.language)
            .ok_or_else(|| FetchError::not_available(format!("No captions found for video {}", video_id)))?;
        debug!("Using caption track: lang={}", track.language_code);

        fetch_timedtext(&self.youtube, &track.base_url).await
    }
}
