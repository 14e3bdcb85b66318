//! Managed Apify actor source.
//!
//! A run goes through three steps: submit the run, poll its status until it
//! is terminal, then download the dataset items it produced.

use super::{CaptionSource, SourceKind};
use crate::config::{ApifySettings, Settings};
use crate::error::{FetchError, Result, ScribeError};
use crate::transcript::{RawSegment, VideoId};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// An actor run as reported by the Apify API.
#[derive(Debug, Deserialize, Clone)]
struct ActorRun {
    id: String,
    status: String,
    #[serde(rename = "defaultDatasetId")]
    default_dataset_id: Option<String>,
}

/// Where a run is in its lifecycle.
#[derive(Debug, PartialEq)]
enum RunPhase {
    Submitted,
    Polling,
    Succeeded { dataset_id: String },
    Failed(String),
    TimedOut(String),
}

/// Map an Apify run status onto the next phase.
///
/// Statuses that are not known to be terminal keep the run polling.
fn next_phase(run: &ActorRun) -> RunPhase {
    match run.status.as_str() {
        "SUCCEEDED" => match &run.default_dataset_id {
            Some(id) => RunPhase::Succeeded {
                dataset_id: id.clone(),
            },
            None => RunPhase::Failed(format!("Run {} succeeded without a dataset", run.id)),
        },
        "FAILED" | "ABORTED" => RunPhase::Failed(format!("Run {} ended with {}", run.id, run.status)),
        "TIMED-OUT" => RunPhase::TimedOut(format!("Run {} timed out on Apify", run.id)),
        _ => RunPhase::Polling,
    }
}

/// Caption source that runs a managed scraping actor.
pub struct ApifySource {
    client: reqwest::Client,
    settings: ApifySettings,
    token: String,
    language: String,
}

impl ApifySource {
    pub fn new(settings: &Settings) -> Result<Self> {
        let token = settings
            .apify
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ScribeError::Config("apify.token is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.apify.client_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            settings: settings.apify.clone(),
            token,
            language: settings.source.language.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn submit(&self, video_id: &VideoId) -> std::result::Result<ActorRun, FetchError> {
        let input = serde_json::json!({
            "videoUrl": video_id.watch_url(),
            "language": self.language,
        });

        let run: Envelope<ActorRun> = send_json(
            self.client
                .post(self.url(&format!("/acts/{}/runs", self.settings.actor_id)))
                .query(&[("waitForFinish", self.settings.run_wait_secs)])
                .bearer_auth(&self.token)
                .json(&input),
        )
        .await?;

        info!("Submitted Apify run {} ({})", run.data.id, run.data.status);
        Ok(run.data)
    }

    async fn fetch_run(&self, run_id: &str) -> std::result::Result<ActorRun, FetchError> {
        let run: Envelope<ActorRun> = send_json(
            self.client
                .get(self.url(&format!("/actor-runs/{}", run_id)))
                .bearer_auth(&self.token),
        )
        .await?;
        Ok(run.data)
    }

    async fn fetch_items(&self, dataset_id: &str) -> std::result::Result<Vec<Value>, FetchError> {
        send_json(
            self.client
                .get(self.url(&format!("/datasets/{}/items", dataset_id)))
                .query(&[("clean", "true"), ("format", "json")])
                .bearer_auth(&self.token),
        )
        .await
    }

    /// Drive a run from submission to a terminal phase.
    async fn run_to_completion(&self, video_id: &VideoId) -> std::result::Result<String, FetchError> {
        let mut phase = RunPhase::Submitted;
        let mut run: Option<ActorRun> = None;
        let mut polls = 0;

        loop {
            phase = match phase {
                RunPhase::Submitted => {
                    let submitted = self.submit(video_id).await?;
                    let next = next_phase(&submitted);
                    run = Some(submitted);
                    next
                }
                RunPhase::Polling => {
                    let run_id = run.as_ref().map(|r| r.id.clone()).unwrap_or_default();
                    if polls >= self.settings.max_polls {
                        RunPhase::TimedOut(format!(
                            "Run {} did not finish after {} status checks",
                            run_id, polls
                        ))
                    } else {
                        tokio::time::sleep(Duration::from_millis(self.settings.poll_interval_ms)).await;
                        polls += 1;
                        let current = self.fetch_run(&run_id).await?;
                        debug!("Run {} status {} (check {})", current.id, current.status, polls);
                        let next = next_phase(&current);
                        run = Some(current);
                        next
                    }
                }
                RunPhase::Succeeded { dataset_id } => return Ok(dataset_id),
                RunPhase::Failed(msg) => return Err(FetchError::transport(msg)),
                RunPhase::TimedOut(msg) => return Err(FetchError::timeout(msg)),
            };
        }
    }
}

/// Classify a failed Apify API call.
///
/// A 404 (or 401/403) from Apify names a missing actor, run, dataset or a bad
/// token, never a video without captions, so only 429 and timeouts keep their
/// own kinds.
fn api_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::timeout(format!("Apify API request timed out: {}", err))
    } else if err.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
        FetchError::rate_limited(format!("Apify API rate limit hit: {}", err))
    } else {
        FetchError::transport(format!("Apify API request failed: {}", err))
    }
}

async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> std::result::Result<T, FetchError> {
    request
        .send()
        .await
        .map_err(api_error)?
        .error_for_status()
        .map_err(api_error)?
        .json()
        .await
        .map_err(api_error)
}

/// Read a number that may be encoded as a JSON string.
fn number_field(item: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match item.get(*k)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn segment_from_item(item: &Value) -> Option<RawSegment> {
    let text = item.get("text")?.as_str()?.to_string();
    Some(RawSegment::new(
        text,
        number_field(item, &["start", "offset", "startTime"]),
        number_field(item, &["duration", "dur"]),
    ))
}

/// Flatten dataset items into raw cues.
///
/// Items are either cues themselves or wrappers holding a cue array.
fn segments_from_items(items: &[Value]) -> Vec<RawSegment> {
    items
        .iter()
        .flat_map(|item| {
            let nested = ["transcript", "captions", "data"]
                .iter()
                .find_map(|k| item.get(*k).and_then(Value::as_array));
            match nested {
                Some(cues) => cues.iter().filter_map(segment_from_item).collect::<Vec<_>>(),
                None => segment_from_item(item).into_iter().collect(),
            }
        })
        .collect()
}

#[async_trait]
impl CaptionSource for ApifySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Apify
    }

    #[instrument(skip(self), fields(video_id = %video_id))]
    async fn retrieve(&self, video_id: &VideoId) -> std::result::Result<Vec<RawSegment>, FetchError> {
        let dataset_id = self.run_to_completion(video_id).await?;
        let items = self.fetch_items(&dataset_id).await?;
        debug!("Dataset {} returned {} items", dataset_id, items.len());
        Ok(segments_from_items(&items))
    }
}
