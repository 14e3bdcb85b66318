//! Caption source abstraction for ytscribe.
//!
//! Provides a trait-based interface for the different caption retrieval
//! strategies. A deployment runs exactly one of them, chosen by
//! `source.kind` in the settings.

mod apify;
mod innertube;
mod timedtext;
mod tracks;
mod watch_page;
mod webdriver;
mod ytdlp;

pub use apify::ApifySource;
pub use innertube::InnertubeSource;
pub use timedtext::parse_timedtext;
pub use tracks::{select_track, CaptionTrack, PlayerResponse};
pub use watch_page::WatchPageSource;
pub use webdriver::WebDriverSource;
pub use ytdlp::YtDlpSource;

pub use crate::config::SourceKind;

use crate::config::Settings;
use crate::error::{FetchError, Result, ScribeError};
use crate::transcript::{RawSegment, VideoId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Trait for caption retrieval strategies.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Get the strategy kind.
    fn kind(&self) -> SourceKind;

    /// Retrieve the raw caption cues for a video.
    ///
    /// An empty result is allowed; the orchestrator classifies it.
    async fn retrieve(&self, video_id: &VideoId) -> std::result::Result<Vec<RawSegment>, FetchError>;
}

/// Build the caption source configured in `settings`.
pub fn build_source(settings: &Settings) -> Result<Arc<dyn CaptionSource>> {
    let source: Arc<dyn CaptionSource> = match settings.source.kind {
        SourceKind::WatchPage => Arc::new(WatchPageSource::new(settings)?),
        SourceKind::Ytdlp => Arc::new(YtDlpSource::new(settings)?),
        SourceKind::Webdriver => Arc::new(WebDriverSource::new(settings)?),
        SourceKind::Innertube => Arc::new(InnertubeSource::new(settings)?),
        SourceKind::Apify => Arc::new(ApifySource::new(settings)?),
    };
    debug!("Using caption source: {}", source.kind());
    Ok(source)
}

/// HTTP client used to talk to YouTube.
pub(crate) fn youtube_client(settings: &Settings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(settings.source.user_agent.clone())
        .timeout(Duration::from_secs(settings.source.request_timeout_secs))
        .build()
        .map_err(ScribeError::Http)
}

/// GET a caption document and parse it as timedtext XML.
pub(crate) async fn fetch_timedtext(
    client: &reqwest::Client,
    url: &str,
) -> std::result::Result<Vec<RawSegment>, FetchError> {
    debug!("Fetching caption track");
    let xml = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    parse_timedtext(&xml)
}
