//! Configuration module for ytscribe.
//!
//! Handles loading settings from TOML with environment overrides.

mod settings;

pub use settings::{
    ApifySettings, RetrySettings, ServerSettings, Settings, SourceKind, SourceSettings,
    WebDriverSettings, YoutubeSettings, YtDlpSettings,
};
