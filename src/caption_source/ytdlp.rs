//! yt-dlp metadata source.
//!
//! Asks yt-dlp for the video metadata, which lists subtitle and automatic
//! caption URLs per language, and downloads the `json3` rendition.

use super::{youtube_client, CaptionSource, SourceKind};
use crate::config::Settings;
use crate::error::{FetchError, Result};
use crate::transcript::{RawSegment, VideoId};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Subset of `yt-dlp --dump-json` output.
#[derive(Debug, Deserialize, Default)]
struct VideoInfo {
    #[serde(default)]
    subtitles: HashMap<String, Vec<SubtitleFormat>>,
    #[serde(default)]
    automatic_captions: HashMap<String, Vec<SubtitleFormat>>,
}

#[derive(Debug, Deserialize, Clone)]
struct SubtitleFormat {
    ext: String,
    url: String,
}

/// YouTube `json3` caption document.
#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs")]
    start_ms: Option<f64>,
    #[serde(rename = "dDurationMs")]
    duration_ms: Option<f64>,
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Caption source backed by yt-dlp metadata.
pub struct YtDlpSource {
    binary: PathBuf,
    client: reqwest::Client,
    language: String,
}

impl YtDlpSource {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            binary: settings.ytdlp_binary(),
            client: youtube_client(settings)?,
            language: settings.source.language.clone(),
        })
    }

    async fn dump_json(&self, video_id: &VideoId) -> std::result::Result<VideoInfo, FetchError> {
        let result = Command::new(&self.binary)
            .arg("--dump-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg(video_id.watch_url())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::transport(format!(
                    "yt-dlp not found at {}",
                    self.binary.display()
                )));
            }
            Err(e) => {
                return Err(FetchError::transport(format!("yt-dlp execution failed: {e}")));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_stderr(&stderr));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Map a yt-dlp failure message to a fetch error.
fn classify_stderr(stderr: &str) -> FetchError {
    let msg = stderr.trim();
    if msg.contains("HTTP Error 429") || msg.contains("not a bot") {
        FetchError::rate_limited(format!("yt-dlp was throttled: {msg}"))
    } else if msg.contains("Video unavailable")
        || msg.contains("Private video")
        || msg.contains("This video has been removed")
    {
        FetchError::not_available(format!("yt-dlp reports the video is unavailable: {msg}"))
    } else {
        FetchError::transport(format!("yt-dlp failed: {msg}"))
    }
}

/// Find the `json3` URL for the preferred language.
///
/// Uploaded subtitles are tried before automatic captions; within each map
/// the requested language wins, then English, then any language.
fn caption_url(info: &VideoInfo, language: &str) -> Option<String> {
    let json3 = |formats: &Vec<SubtitleFormat>| {
        formats
            .iter()
            .find(|f| f.ext == "json3")
            .map(|f| f.url.clone())
    };

    let pick = |map: &HashMap<String, Vec<SubtitleFormat>>| {
        let by_prefix = |lang: &str| {
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|k| *k == lang || k.starts_with(&format!("{lang}-")))
                .collect();
            keys.sort();
            keys.into_iter().find_map(|k| json3(&map[k]))
        };

        by_prefix(language).or_else(|| by_prefix("en")).or_else(|| {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.into_iter().find_map(|k| json3(&map[k]))
        })
    };

    pick(&info.subtitles).or_else(|| pick(&info.automatic_captions))
}

fn parse_json3(body: &str) -> std::result::Result<Vec<RawSegment>, FetchError> {
    let doc: Json3Document = serde_json::from_str(body)?;

    Ok(doc
        .events
        .into_iter()
        .filter_map(|event| {
            let segs = event.segs?;
            let text: String = segs.into_iter().map(|s| s.utf8).collect();
            Some(RawSegment::new(
                text.replace('\n', " "),
                event.start_ms.map(|ms| ms / 1000.0),
                event.duration_ms.map(|ms| ms / 1000.0),
            ))
        })
        .collect())
}

#[async_trait]
impl CaptionSource for YtDlpSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Ytdlp
    }

    #[instrument(skip(self), fields(video_id = %video_id))]
    async fn retrieve(&self, video_id: &VideoId) -> std::result::Result<Vec<RawSegment>, FetchError> {
        let info = self.dump_json(video_id).await?;

        let url = caption_url(&info, &self.language).ok_or_else(|| {
            FetchError::not_available(format!("yt-dlp lists no captions for video {}", video_id))
        })?;
        debug!("Fetching json3 captions");

        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_json3(&body)
    }
}
