//! Watch page scraping source.
//!
//! Reads the `captions` object embedded in the watch page HTML, the same way
//! transcript libraries do, then downloads the chosen timedtext track.

use super::tracks::{CaptionsData, PlayabilityStatus, PlayerResponse};
use super::{fetch_timedtext, select_track, youtube_client, CaptionSource, SourceKind};
use crate::config::Settings;
use crate::error::{FetchError, Result};
use crate::transcript::{RawSegment, VideoId};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, instrument};

static PLAYABILITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""playabilityStatus":\{"status":"([A-Z_]+)"(?:,"reason":"([^"]*)")?"#)
        .expect("Invalid regex")
});

/// Caption source backed by the public watch page.
pub struct WatchPageSource {
    client: reqwest::Client,
    base_url: String,
    language: String,
}

impl WatchPageSource {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: youtube_client(settings)?,
            base_url: settings.youtube.base_url.trim_end_matches('/').to_string(),
            language: settings.source.language.clone(),
        })
    }

    async fn fetch_page(&self, video_id: &VideoId) -> std::result::Result<String, FetchError> {
        let url = format!("{}/watch", self.base_url);
        debug!("Fetching watch page: {}?v={}", url, video_id);

        let html = self
            .client
            .get(&url)
            .query(&[("v", video_id.as_str()), ("hl", self.language.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(html)
    }
}

/// Extract the player response fragment that carries caption tracks.
pub(crate) fn player_response_from_html(
    html: &str,
    video_id: &VideoId,
) -> std::result::Result<PlayerResponse, FetchError> {
    let playability_status = PLAYABILITY_REGEX.captures(html).map(|caps| PlayabilityStatus {
        status: caps[1].to_string(),
        reason: caps.get(2).map(|m| m.as_str().to_string()),
    });

    let Some((_, after)) = html.split_once(r#""captions":"#) else {
        if html.contains(r#"class="g-recaptcha""#) {
            return Err(FetchError::rate_limited(
                "YouTube is receiving too many requests from this IP and now requires solving a captcha",
            ));
        }
        if !html.contains(r#""playabilityStatus":"#) {
            return Err(FetchError::not_available(format!(
                "The video is no longer available ({})",
                video_id
            )));
        }
        return Ok(PlayerResponse {
            playability_status,
            captions: None,
        });
    };

    let fragment = after
        .split_once(r#","videoDetails"#)
        .map(|(head, _)| head)
        .unwrap_or(after);

    let captions: CaptionsData = serde_json::from_str(fragment)?;

    Ok(PlayerResponse {
        playability_status,
        captions: Some(captions),
    })
}

#[async_trait]
impl CaptionSource for WatchPageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::WatchPage
    }

    #[instrument(skip(self), fields(video_id = %video_id))]
    async fn retrieve(&self, video_id: &VideoId) -> std::result::Result<Vec<RawSegment>, FetchError> {
        let html = self.fetch_page(video_id).await?;
        let tracks = player_response_from_html(&html, video_id)?.into_caption_tracks(video_id)?;

        let track = select_track(&tracks, &self.language)
            .ok_or_else(|| FetchError::not_available(format!("No captions found for video {}", video_id)))?;
        debug!("Using caption track: lang={}", track.language_code);

        fetch_timedtext(&self.client, &track.base_url).await
    }
}
