//! Player response models and caption track selection.

use crate::error::FetchError;
use crate::transcript::VideoId;
use serde::Deserialize;

/// The subset of a YouTube player response needed to find captions.
#[derive(Debug, Deserialize, Default)]
pub struct PlayerResponse {
    #[serde(rename = "playabilityStatus")]
    pub playability_status: Option<PlayabilityStatus>,
    pub captions: Option<CaptionsData>,
}

#[derive(Debug, Deserialize)]
pub struct PlayabilityStatus {
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    pub player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
pub struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    pub caption_tracks: Option<Vec<CaptionTrack>>,
}

/// A caption track advertised by YouTube.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "languageCode")]
    pub language_code: String,
    /// `asr` for auto-generated tracks.
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    pub fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    fn matches_language(&self, language: &str) -> bool {
        let code = self.language_code.to_lowercase();
        let language = language.to_lowercase();
        code == language || code.starts_with(&format!("{}-", language))
    }
}

impl PlayerResponse {
    /// Caption tracks for a playable video.
    ///
    /// An unplayable video or one without tracks is `NotAvailable`; a bot
    /// check is reported as rate limiting.
    pub fn into_caption_tracks(self, video_id: &VideoId) -> Result<Vec<CaptionTrack>, FetchError> {
        if let Some(status) = &self.playability_status {
            if status.status != "OK" {
                let reason = status.reason.clone().unwrap_or_default();
                if reason.contains("not a bot") {
                    return Err(FetchError::rate_limited(format!(
                        "YouTube requested a bot check for video {}",
                        video_id
                    )));
                }
                return Err(FetchError::not_available(format!(
                    "Video {} is not playable ({}): {}",
                    video_id, status.status, reason
                )));
            }
        }

        let tracks = self
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default();

        if tracks.is_empty() {
            return Err(FetchError::not_available(format!(
                "No captions found for video {}",
                video_id
            )));
        }

        Ok(tracks)
    }
}

/// Pick the track to download.
///
/// Preference: the requested language, then English, then the first track.
/// Within a language, manually created tracks win over auto-generated ones.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let best_in = |lang: &str| {
        tracks
            .iter()
            .filter(|t| t.matches_language(lang))
            .min_by_key(|t| t.is_auto_generated())
    };

    best_in(language)
        .or_else(|| best_in("en"))
        .or_else(|| tracks.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;

    fn track(lang: &str, kind: Option<&str>) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://example.com/{}", lang),
            language_code: lang.to_string(),
            kind: kind.map(String::from),
        }
    }

    #[test]
    fn test_prefers_requested_language() {
        let tracks = vec![track("en", None), track("de", None)];
        assert_eq!(select_track(&tracks, "de").unwrap().language_code, "de");
    }

    #[test]
    fn test_falls_back_to_english_then_first() {
        let tracks = vec![track("fr", None), track("en-GB", None)];
        assert_eq!(select_track(&tracks, "de").unwrap().language_code, "en-GB");

        let tracks = vec![track("fr", None), track("es", None)];
        assert_eq!(select_track(&tracks, "en").unwrap().language_code, "fr");

        assert!(select_track(&[], "en").is_none());
    }

    #[test]
    fn test_prefers_manual_over_auto_generated() {
        let tracks = vec![track("en", Some("asr")), track("en", None)];
        let chosen = select_track(&tracks, "en").unwrap();
        assert!(!chosen.is_auto_generated());
    }

    #[test]
    fn test_player_response_tracks() {
        let json = r#"{
            "playabilityStatus": {"status": "OK"},
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
                {"baseUrl": "https://www.youtube.com/api/timedtext?v=x", "languageCode": "en", "kind": "asr"}
            ]}}
        }"#;
        let resp: PlayerResponse = serde_json::from_str(json).unwrap();
        let vid = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let tracks = resp.into_caption_tracks(&vid).unwrap();
        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].is_auto_generated());
    }

    #[test]
    fn test_player_response_classification() {
        let vid = VideoId::parse("dQw4w9WgXcQ").unwrap();

        let resp: PlayerResponse = serde_json::from_str(r#"{"playabilityStatus": {"status": "OK"}}"#).unwrap();
        assert_eq!(resp.into_caption_tracks(&vid).unwrap_err().kind, FetchErrorKind::NotAvailable);

        let resp: PlayerResponse = serde_json::from_str(
            r#"{"playabilityStatus": {"status": "ERROR", "reason": "Video unavailable"}}"#,
        )
        .unwrap();
        assert_eq!(resp.into_caption_tracks(&vid).unwrap_err().kind, FetchErrorKind::NotAvailable);

        let resp: PlayerResponse = serde_json::from_str(
            r#"{"playabilityStatus": {"status": "LOGIN_REQUIRED", "reason": "Sign in to confirm you're not a bot"}}"#,
        )
        .unwrap();
        assert_eq!(
            resp.into_caption_tracks(&vid).unwrap_err().kind,
            FetchErrorKind::UpstreamRateLimited
        );
    }
}
