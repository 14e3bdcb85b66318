//! ytscribe - YouTube transcript service
//!
//! Fetches the caption track of a YouTube video and serves it as a JSON array
//! of timed text segments.
//!
//! # Overview
//!
//! ytscribe allows you to:
//! - Serve transcripts over HTTP (`GET /api/transcript/{videoId}`)
//! - Fetch a single transcript from the command line as JSON, text or SRT
//! - Choose how captions are retrieved per deployment (watch page scraping,
//!   yt-dlp, a WebDriver browser, the InnerTube API or an Apify actor)
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `caption_source` - Caption retrieval strategies
//! - `transcript` - Video IDs, segments and normalization
//! - `retry` - Bounded retry with exponential backoff
//! - `orchestrator` - Fetch pipeline coordination
//! - `cli` - Command line interface and HTTP server
//!
//! # Example
//!
//! ```rust,no_run
//! use ytscribe::config::Settings;
//! use ytscribe::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(&settings)?;
//!
//!     let transcript = orchestrator.fetch_transcript_str("dQw4w9WgXcQ").await?;
//!     println!("Fetched {} segments", transcript.len());
//!
//!     Ok(())
//! }
//! ```

pub mod caption_source;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod transcript;

pub use error::{FetchError, Result, ScribeError};
