//! Library error type.
//!
//! Only [`ReelError::Narration`] ends a run from inside the pipeline. Every
//! other per-unit problem is logged and skipped where it is detected, so the
//! remaining variants come from configuration, layer media, the ledger and the
//! compositor.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building a video from a thread
#[derive(Error, Debug)]
pub enum ReelError {
    #[error("Narration failed for {path}: {source}")]
    Narration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Media probe error: {0}")]
    Probe(String),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid thread: {0}")]
    Thread(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl ReelError {
    /// Whether this error must end the run.
    #[must_use]
    pub fn is_fatal_narration(&self) -> bool {
        matches!(self, Self::Narration { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReelError>;
