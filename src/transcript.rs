//! Transcript data model and normalization.

use crate::error::FetchError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Duration assigned to the final segment when the upstream omits it.
pub const FALLBACK_FINAL_DURATION: f64 = 5.0;

/// Required length of a YouTube video ID.
pub const VIDEO_ID_LEN: usize = 11;

static VIDEO_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?:
            (?:https?://)?
            (?:www\.|m\.)?
            (?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/|youtube\.com/shorts/)
            ([a-zA-Z0-9_-]{11})
        )
        |
        ^([a-zA-Z0-9_-]{11})$
    ",
    )
    .expect("Invalid regex")
});

/// A validated YouTube video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    /// Validate a raw identifier. Only the length is checked; the
    /// identifier is otherwise opaque.
    pub fn parse(input: &str) -> Result<Self, FetchError> {
        if input.is_empty() || input.chars().count() != VIDEO_ID_LEN {
            return Err(FetchError::invalid_input(
                "Video ID must be 11 characters long",
            ));
        }
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch page URL.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract a video ID from a YouTube URL or a bare ID.
pub fn extract_video_id(input: &str) -> Option<String> {
    let caps = VIDEO_URL_REGEX.captures(input.trim())?;

    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// A caption cue as handed back by a caption source, before normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSegment {
    /// Cue text, possibly still carrying HTML entities.
    pub text: String,
    /// Start time in seconds.
    pub start: Option<f64>,
    /// Duration in seconds.
    pub duration: Option<f64>,
}

impl RawSegment {
    pub fn new(text: impl Into<String>, start: Option<f64>, duration: Option<f64>) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }
}

/// A single timed caption segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Decoded caption text.
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }

    /// End time in seconds.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A non-empty caption track, ordered by start time.
///
/// Serializes as a bare JSON array of segments.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Normalize raw cues into a transcript.
    ///
    /// Every cue is kept, blank ones included, so the output lines up with the
    /// upstream track. Returns `NotAvailable` only when there are no cues.
    pub fn normalize(video_id: &VideoId, raw: Vec<RawSegment>) -> Result<Self, FetchError> {
        let mut cues: Vec<(String, Option<f64>, Option<f64>)> = raw
            .into_iter()
            .map(|r| {
                let text = html_escape::decode_html_entities(&r.text).into_owned();
                (text, r.start.map(non_negative), r.duration.map(non_negative))
            })
            .collect();

        if cues.is_empty() {
            return Err(FetchError::not_available(format!(
                "No transcript was found for video {}",
                video_id
            )));
        }

        // Fill missing starts from the running end of the previous cue
        let mut cursor = 0.0;
        for cue in cues.iter_mut() {
            let start = *cue.1.get_or_insert(cursor);
            cursor = start + cue.2.unwrap_or(0.0);
        }

        cues.sort_by(|a, b| a.1.unwrap_or(0.0).total_cmp(&b.1.unwrap_or(0.0)));

        let starts: Vec<f64> = cues.iter().map(|c| c.1.unwrap_or(0.0)).collect();
        let segments = cues
            .into_iter()
            .enumerate()
            .map(|(i, (text, start, duration))| {
                let start = start.unwrap_or(0.0);
                let duration = duration.unwrap_or_else(|| match starts.get(i + 1) {
                    Some(next) => (next - start).max(0.0),
                    None => FALLBACK_FINAL_DURATION,
                });
                TranscriptSegment::new(text, start, duration)
            })
            .collect();

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// End time of the last segment.
    pub fn duration_seconds(&self) -> f64 {
        self.segments.last().map(|s| s.end()).unwrap_or(0.0)
    }

    /// Plain text with one `[MM:SS] text` line per segment.
    pub fn format_with_timestamps(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("[{}] {}", format_timestamp(s.start), s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// SubRip rendering.
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for (i, s) in self.segments.iter().enumerate() {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                srt_timestamp(s.start),
                srt_timestamp(s.end()),
                s.text
            ));
        }
        out
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;

    fn vid() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn test_video_id_length() {
        assert!(VideoId::parse("dQw4w9WgXcQ").is_ok());

        for bad in ["", "short", "dQw4w9WgXcQx", "dQw4w9WgXc"] {
            let err = VideoId::parse(bad).unwrap_err();
            assert_eq!(err.kind, FetchErrorKind::InvalidInput);
        }
    }

    #[test]
    fn test_video_id_counts_characters() {
        // 11 characters, more than 11 bytes
        assert!(VideoId::parse("ééééééééééé").is_ok());
    }

    #[test]
    fn test_extract_video_id() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=12"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://youtube.com/shorts/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("  dQw4w9WgXcQ "),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(extract_video_id("not-a-video-id"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn test_normalize_passes_through_clean_input() {
        let raw = vec![
            RawSegment::new("Hello", Some(0.0), Some(2.0)),
            RawSegment::new("World", Some(2.0), Some(3.0)),
        ];
        let transcript = Transcript::normalize(&vid(), raw).unwrap();
        assert_eq!(
            transcript.segments(),
            &[
                TranscriptSegment::new("Hello", 0.0, 2.0),
                TranscriptSegment::new("World", 2.0, 3.0),
            ]
        );
    }

    #[test]
    fn test_normalize_decodes_entities_once() {
        let raw = vec![
            RawSegment::new("Tom &amp; Jerry", Some(0.0), Some(1.0)),
            RawSegment::new("&lt;b&gt; &quot;hi&quot; it&#39;s", Some(1.0), Some(1.0)),
            RawSegment::new("&amp;amp;", Some(2.0), Some(1.0)),
        ];
        let transcript = Transcript::normalize(&vid(), raw).unwrap();
        let texts: Vec<&str> = transcript.segments().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Tom & Jerry", "<b> \"hi\" it's", "&amp;"]);
    }

    #[test]
    fn test_normalize_sorts_by_start() {
        let raw = vec![
            RawSegment::new("second", Some(4.0), Some(1.0)),
            RawSegment::new("first", Some(1.0), Some(1.0)),
        ];
        let transcript = Transcript::normalize(&vid(), raw).unwrap();
        assert_eq!(transcript.segments()[0].text, "first");
        assert_eq!(transcript.segments()[1].text, "second");
    }

    #[test]
    fn test_normalize_fills_missing_durations() {
        let raw = vec![
            RawSegment::new("a", Some(0.0), None),
            RawSegment::new("b", Some(1.5), None),
        ];
        let transcript = Transcript::normalize(&vid(), raw).unwrap();
        assert_eq!(transcript.segments()[0].duration, 1.5);
        assert_eq!(transcript.segments()[1].duration, FALLBACK_FINAL_DURATION);
    }

    #[test]
    fn test_normalize_clamps_negative_values() {
        let raw = vec![RawSegment::new("a", Some(-3.0), Some(-1.0))];
        let transcript = Transcript::normalize(&vid(), raw).unwrap();
        assert_eq!(transcript.segments()[0].start, 0.0);
        assert_eq!(transcript.segments()[0].duration, 0.0);
    }

    #[test]
    fn test_normalize_fills_missing_start_from_previous_end() {
        let raw = vec![
            RawSegment::new("a", Some(1.0), Some(2.0)),
            RawSegment::new("b", None, Some(1.0)),
        ];
        let transcript = Transcript::normalize(&vid(), raw).unwrap();
        assert_eq!(transcript.segments()[1].start, 3.0);
    }

    #[test]
    fn test_normalize_empty_is_not_available() {
        let err = Transcript::normalize(&vid(), Vec::new()).unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NotAvailable);
    }

    #[test]
    fn test_normalize_keeps_blank_cues() {
        let raw = vec![
            RawSegment::new("Hello", Some(0.0), Some(2.0)),
            RawSegment::new("   ", Some(2.0), Some(1.0)),
            RawSegment::new("", Some(3.0), Some(1.0)),
            RawSegment::new("World", Some(4.0), Some(1.0)),
        ];
        let transcript = Transcript::normalize(&vid(), raw).unwrap();
        let texts: Vec<&str> = transcript.segments().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["Hello", "   ", "", "World"]);

        let blank = vec![RawSegment::new("   ", Some(0.0), Some(1.0))];
        let transcript = Transcript::normalize(&vid(), blank).unwrap();
        assert_eq!(transcript.segments(), &[TranscriptSegment::new("   ", 0.0, 1.0)]);
    }

    #[test]
    fn test_serializes_as_array() {
        let raw = vec![RawSegment::new("Hello", Some(0.0), Some(2.0))];
        let transcript = Transcript::normalize(&vid(), raw).unwrap();
        let json = serde_json::to_value(&transcript).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "text": "Hello", "start": 0.0, "duration": 2.0 }])
        );
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(65.0), "01:05");
        assert_eq!(format_timestamp(3665.0), "01:01:05");
    }

    #[test]
    fn test_to_srt() {
        let raw = vec![RawSegment::new("Hi", Some(1.25), Some(2.0))];
        let transcript = Transcript::normalize(&vid(), raw).unwrap();
        assert_eq!(transcript.to_srt(), "1\n00:00:01,250 --> 00:00:03,250\nHi\n\n");
    }
}
