//! Transcript fetch orchestrator for ytscribe.
//!
//! Validates the video ID, drives the configured caption source under the
//! retry policy and turns its output into a normalized transcript.

use crate::caption_source::{build_source, CaptionSource};
use crate::config::Settings;
use crate::error::{FetchError, Result};
use crate::retry::{retry, RetryPolicy};
use crate::transcript::{Transcript, VideoId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// The transcript fetch pipeline.
pub struct Orchestrator {
    source: Arc<dyn CaptionSource>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl Orchestrator {
    /// Create an orchestrator using the source configured in `settings`.
    pub fn new(settings: &Settings) -> Result<Self> {
        let source = build_source(settings)?;
        Ok(Self::with_source(
            source,
            RetryPolicy::from(&settings.retry),
            settings.attempt_timeout(),
        ))
    }

    /// Create an orchestrator with a custom caption source.
    pub fn with_source(
        source: Arc<dyn CaptionSource>,
        policy: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            source,
            policy,
            attempt_timeout,
        }
    }

    /// Validate a raw ID and fetch its transcript.
    pub async fn fetch_transcript_str(&self, input: &str) -> std::result::Result<Transcript, FetchError> {
        let video_id = VideoId::parse(input)?;
        self.fetch_transcript(&video_id).await
    }

    /// Fetch the transcript for a validated video ID.
    #[instrument(skip(self), fields(video_id = %video_id, source = %self.source.kind()))]
    pub async fn fetch_transcript(&self, video_id: &VideoId) -> std::result::Result<Transcript, FetchError> {
        let source_name = self.source.kind().to_string();
        let source = &self.source;
        let attempt_timeout = self.attempt_timeout;

        let transcript = retry(&self.policy, &source_name, move |_| async move {
            let raw = match tokio::time::timeout(attempt_timeout, source.retrieve(video_id)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(FetchError::timeout(format!(
                        "Attempt exceeded {:?}",
                        attempt_timeout
                    )))
                }
            };
            Transcript::normalize(video_id, raw)
        })
        .await?;

        info!("Fetched transcript with {} entries", transcript.len());
        Ok(transcript)
    }
}
