//! Fetch command implementation.

use crate::cli::{preflight, FetchFormat, Output};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::transcript::{extract_video_id, Transcript, VideoId};
use anyhow::Result;

/// Run the fetch command.
pub async fn run_fetch(
    video: &str,
    format: FetchFormat,
    output: Option<String>,
    settings: Settings,
) -> Result<()> {
    let raw_id = extract_video_id(video).unwrap_or_else(|| video.to_string());
    let video_id = VideoId::parse(&raw_id)?;

    preflight::check(&settings)?;
    let orchestrator = Orchestrator::new(&settings)?;

    let spinner = Output::spinner(&format!(
        "Fetching transcript for {} via {}...",
        video_id, settings.source.kind
    ));
    let result = orchestrator.fetch_transcript(&video_id).await;
    spinner.finish_and_clear();
    let transcript = result?;

    let rendered = render(&transcript, format)?;

    match output {
        Some(path) if path != "-" => {
            std::fs::write(&path, &rendered)?;
            Output::success(&format!("Wrote transcript to {}", path));
        }
        _ => println!("{}", rendered),
    }
    Output::transcript_summary(
        video_id.as_str(),
        transcript.len(),
        transcript.duration_seconds(),
    );

    Ok(())
}

fn render(transcript: &Transcript, format: FetchFormat) -> Result<String> {
    Ok(match format {
        FetchFormat::Json => serde_json::to_string_pretty(transcript)?,
        FetchFormat::Text => transcript.format_with_timestamps(),
        FetchFormat::Srt => transcript.to_srt(),
    })
}
