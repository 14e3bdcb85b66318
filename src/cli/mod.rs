//! CLI module for ytscribe.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand, ValueEnum};

/// ytscribe - YouTube transcript service
///
/// Serves the caption track of a YouTube video as JSON timed text segments.
#[derive(Parser, Debug)]
#[command(name = "ytscribe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "YTSCRIBE_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the transcript HTTP server
    Serve {
        /// Host to bind to (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fetch one transcript and print or save it
    Fetch {
        /// YouTube URL or video ID
        video: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = FetchFormat::Json)]
        format: FetchFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Check the configured caption source and its prerequisites
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Output format for `fetch`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFormat {
    /// JSON array of segments, as served over HTTP
    Json,
    /// Plain text with timestamps
    Text,
    /// SubRip subtitles
    Srt,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::parse_from(["ytscribe", "-vv", "fetch", "dQw4w9WgXcQ", "--format", "srt"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Fetch { video, format, output } => {
                assert_eq!(video, "dQw4w9WgXcQ");
                assert_eq!(format, FetchFormat::Srt);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["ytscribe", "-c", "/tmp/x.toml", "serve", "--port", "8080"]);
        assert_eq!(cli.config.as_deref(), Some("/tmp/x.toml"));
        assert!(matches!(
            cli.command,
            Commands::Serve { host: None, port: Some(8080) }
        ));
    }
}
