//! External collaborators
//!
//! The pipeline talks to the outside world only through these traits:
//!
//! | Trait | Adapter | Backed by |
//! |-------|---------|-----------|
//! | [`Narrator`] | [`CommandNarrator`] | any TTS command line |
//! | [`MediaProbe`] | [`FfprobeProbe`] | `ffprobe`, `image` |
//! | [`ScreenshotSource`] | [`ScreenshotCapture`] | capture binary + directory scan |
//! | [`Compositor`] | [`FfmpegCompositor`] | `ffmpeg -filter_complex` |
//! | [`Ledger`] | [`JsonLedger`] | JSON lines file |
//! | [`Publisher`] | [`CommandPublisher`] | upload binary |
//!
//! All calls block. Tests swap the adapters for in-memory fakes.

pub mod compositor;
pub mod ledger;
pub mod narrate;
pub mod probe;
pub mod publish;
pub mod screenshot;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layout::FrameSize;
use crate::output::{LedgerRow, RunOutput, VideoMetadata};
use crate::timeline::Timeline;

pub use compositor::{FfmpegCompositor, FfmpegConfig};
pub use ledger::JsonLedger;
pub use narrate::CommandNarrator;
pub use probe::FfprobeProbe;
pub use publish::CommandPublisher;
pub use screenshot::ScreenshotCapture;

/// Turns text into a narration audio file
pub trait Narrator {
    /// Write spoken `text` to `output`.
    fn synthesize(&self, text: &str, output: &Path) -> std::io::Result<()>;
}

/// Stream facts about a media file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

impl MediaInfo {
    #[must_use]
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// Reads durations and dimensions
pub trait MediaProbe {
    /// Duration, frame size and audio presence of an audio or video file.
    fn media_info(&self, path: &Path) -> Result<MediaInfo>;

    /// Pixel size of a still image.
    fn image_size(&self, path: &Path) -> Result<FrameSize>;
}

/// What to screenshot for one thread
#[derive(Debug, Clone, Serialize)]
pub struct CaptureRequest {
    pub thread_id: String,
    /// Absolute URL of the discussion
    pub locator: String,
    pub output_dir: PathBuf,
    pub include_title: bool,
    pub comment_ids: Vec<String>,
}

/// Screenshot files keyed by `"title"` or comment id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenshotSet {
    files: BTreeMap<String, PathBuf>,
}

impl ScreenshotSet {
    pub const TITLE_KEY: &'static str = "title";

    pub fn insert(&mut self, key: impl Into<String>, path: PathBuf) {
        self.files.insert(key.into(), path);
    }

    #[must_use]
    pub fn title(&self) -> Option<&Path> {
        self.get(Self::TITLE_KEY)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Path> {
        self.files.get(key).map(PathBuf::as_path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Produces screenshot images for a thread
pub trait ScreenshotSource {
    fn capture(&self, request: &CaptureRequest) -> Result<ScreenshotSet>;
}

/// Renders a finished timeline to a media file
pub trait Compositor {
    fn compose(&self, timeline: &Timeline, output: &Path, fps: u32) -> Result<()>;
}

/// Append-only record of runs, one row per thread
pub trait Ledger {
    fn append(&self, row: &LedgerRow) -> Result<()>;
    fn is_uploaded(&self, id: &str) -> Result<bool>;
    fn mark_uploaded(&self, id: &str) -> Result<()>;
    fn mark_compiled(&self, id: &str) -> Result<()>;
}

/// Pushes a finished video to a hosting platform
pub trait Publisher {
    /// Whether credentials are in place.
    fn is_ready(&self) -> bool;

    fn publish(&self, output: &RunOutput, metadata: &VideoMetadata) -> Result<()>;
}
