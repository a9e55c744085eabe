//! Settings loaded from `~/.config/threadreel/config.toml`.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Settings are read once and passed by reference; nothing
//! mutates them during a run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReelError, Result};
use crate::filter::FilterConfig;
use crate::layout::{FrameSize, TextMetrics};
use crate::segment::{Position, RenderStyle};
use crate::timeline::AssemblerLimits;

/// Frame orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

/// How accepted comments are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStyle {
    /// Screenshot of the comment
    #[default]
    Screenshot,
    /// Comment body as a caption
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub vertical_width: u32,
    pub vertical_height: u32,
    pub orientation: Orientation,
    pub fps: u32,
    /// Ceiling on narrated duration, seconds
    pub max_video_length: f64,
    /// Silence after each narrated segment, seconds
    pub pause: f64,
    pub transition_duration: f64,
    pub transition_volume: f64,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            vertical_width: 1080,
            vertical_height: 1920,
            orientation: Orientation::Landscape,
            fps: 24,
            max_video_length: 60.0,
            pause: 1.0,
            transition_duration: 1.0,
            transition_volume: 0.3,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "medium".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSettings {
    pub font: String,
    pub font_size: u32,
    pub color: String,
    pub box_color: String,
    pub opacity: f64,
    pub char_width_ratio: f64,
    pub line_spacing: f64,
    /// Left and right caption margin, pixels
    pub margin: u32,
    pub margin_top: u32,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            font: "Impact".to_string(),
            font_size: 60,
            color: "white".to_string(),
            box_color: "black".to_string(),
            opacity: 1.0,
            char_width_ratio: 0.55,
            line_spacing: 1.2,
            margin: 50,
            margin_top: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentSettings {
    pub style: CommentStyle,
    pub limit: usize,
    pub length_max: usize,
    pub removed_sentinels: Vec<String>,
    pub blocked_topics: Vec<String>,
    pub opacity: f64,
    /// Screenshot width as a fraction of the frame width
    pub width: f64,
}

impl Default for CommentSettings {
    fn default() -> Self {
        let filter = FilterConfig::default();
        Self {
            style: CommentStyle::Screenshot,
            limit: filter.comment_limit,
            length_max: filter.max_length,
            removed_sentinels: filter.removed_sentinels,
            blocked_topics: filter.blocked_topics,
            opacity: 0.95,
            width: 0.9,
        }
    }
}

/// Crop rectangle in source pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundSettings {
    pub directory: PathBuf,
    /// Used when backgrounds are disabled
    pub colour: String,
    pub opacity: f64,
    pub volume: f64,
    /// Portrait crop; centred when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropBox>,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("backgrounds"),
            colour: "black".to_string(),
            opacity: 1.0,
            volume: 0.15,
            crop: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub opacity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<FrameSize>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            file: None,
            opacity: 0.8,
            size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenterSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<FrameSize>,
    pub remove_greenscreen: bool,
    pub greenscreen_color: String,
    pub greenscreen_similarity: f64,
    pub greenscreen_blend: f64,
}

impl Default for PresenterSettings {
    fn default() -> Self {
        Self {
            file: None,
            position: Position::BottomRight,
            size: None,
            remove_greenscreen: false,
            greenscreen_color: "0x00FF00".to_string(),
            greenscreen_similarity: 0.3,
            greenscreen_blend: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationSettings {
    /// TTS program
    pub command: String,
    /// Arguments; `{text}` and `{output}` are substituted
    pub args: Vec<String>,
    /// Audio file extension the command writes
    pub extension: String,
    pub title_volume: f64,
    pub body_volume: f64,
    pub comment_volume: f64,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            command: "espeak-ng".to_string(),
            args: vec![
                "-w".to_string(),
                "{output}".to_string(),
                "{text}".to_string(),
            ],
            extension: "wav".to_string(),
            title_volume: 2.0,
            body_volume: 1.5,
            comment_volume: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotSettings {
    /// Capture program; without one only existing files are used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<PathBuf>,
    /// Use the title screenshot instead of the thumbnail
    pub title_image: bool,
}

impl Default for ScreenshotSettings {
    fn default() -> Self {
        Self {
            command: None,
            title_image: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<PathBuf>,
    pub args: Vec<String>,
    /// Files that must exist before publishing
    pub credential_files: Vec<PathBuf>,
    /// Append ` #shorts` to the description
    pub hashtag_shorts: bool,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            credential_files: vec![
                PathBuf::from("client_secret.json"),
                PathBuf::from("credentials.storage"),
            ],
            hashtag_shorts: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub speech_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    pub video_dir: PathBuf,
    pub referral_file: PathBuf,
    pub transition_clip: PathBuf,
    pub ledger: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            speech_dir: PathBuf::from("speech"),
            screenshot_dir: PathBuf::from("screenshots"),
            video_dir: PathBuf::from("videos"),
            referral_file: PathBuf::from("referral.txt"),
            transition_clip: PathBuf::from("static.mp4"),
            ledger: PathBuf::from("data.jsonl"),
            thumbnail: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub background: bool,
    pub overlay: bool,
    pub presenter: bool,
    pub selftext: bool,
    pub comments: bool,
    pub transition: bool,
    pub compilation: bool,
    pub upload: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            background: true,
            overlay: false,
            presenter: false,
            selftext: true,
            comments: true,
            transition: true,
            compilation: true,
            upload: false,
        }
    }
}

/// All settings for a run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub video: VideoSettings,
    pub text: TextSettings,
    pub comments: CommentSettings,
    pub background: BackgroundSettings,
    pub overlay: OverlaySettings,
    pub presenter: PresenterSettings,
    pub narration: NarrationSettings,
    pub screenshots: ScreenshotSettings,
    pub publish: PublishSettings,
    pub paths: PathSettings,
    pub features: FeatureFlags,
}

impl Settings {
    /// Load settings.
    ///
    /// An explicit path must exist. Without one, the default config file is
    /// used when present, otherwise built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = default_config_path();
                if !default.exists() {
                    debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        debug!(path = %path.display(), "loading settings");
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ReelError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML settings.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ReelError::Config(e.to_string()))
    }

    /// Reject settings that cannot produce a video.
    pub fn validate(&self) -> Result<()> {
        let video = &self.video;

        if video.width == 0
            || video.height == 0
            || video.vertical_width == 0
            || video.vertical_height == 0
        {
            return Err(ReelError::Config("frame dimensions must be positive".into()));
        }
        if video.fps == 0 {
            return Err(ReelError::Config("fps must be positive".into()));
        }
        if video.max_video_length <= 0.0 {
            return Err(ReelError::Config("max_video_length must be positive".into()));
        }
        if video.pause < 0.0 {
            return Err(ReelError::Config("pause must not be negative".into()));
        }
        if video.transition_duration <= 0.0 {
            return Err(ReelError::Config("transition_duration must be positive".into()));
        }
        if self.comments.limit == 0 {
            return Err(ReelError::Config("comment limit must be at least 1".into()));
        }
        if self.text.font_size == 0 {
            return Err(ReelError::Config("font_size must be positive".into()));
        }
        if self.text.margin.saturating_mul(2) >= self.frame_size().width {
            return Err(ReelError::Config("text margin leaves no room for captions".into()));
        }

        let opacities = [
            ("text.opacity", self.text.opacity),
            ("comments.opacity", self.comments.opacity),
            ("background.opacity", self.background.opacity),
            ("overlay.opacity", self.overlay.opacity),
        ];
        for (name, value) in opacities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ReelError::Config(format!("{name} must be within 0..=1")));
            }
        }

        if self.comments.width <= 0.0 {
            return Err(ReelError::Config("comments.width must be positive".into()));
        }

        Ok(())
    }

    /// Output frame size for the configured orientation
    #[must_use]
    pub fn frame_size(&self) -> FrameSize {
        match self.video.orientation {
            Orientation::Landscape => FrameSize::new(self.video.width, self.video.height),
            Orientation::Portrait => {
                FrameSize::new(self.video.vertical_width, self.video.vertical_height)
            }
        }
    }

    /// Caption metrics for the output frame
    #[must_use]
    pub fn text_metrics(&self) -> TextMetrics {
        TextMetrics {
            font_size: self.text.font_size,
            box_width: self
                .frame_size()
                .width
                .saturating_sub(self.text.margin.saturating_mul(2)),
            char_width_ratio: self.text.char_width_ratio,
            line_spacing: self.text.line_spacing,
        }
    }

    /// Style for body text and re-flowed comment lines
    #[must_use]
    pub fn body_style(&self) -> RenderStyle {
        RenderStyle {
            font: self.text.font.clone(),
            font_size: self.text.font_size,
            color: self.text.color.clone(),
            box_color: None,
            opacity: self.text.opacity,
            position: Position::Custom(self.text.margin as f32, self.text.margin_top as f32),
        }
    }

    /// Style for whole-comment captions
    #[must_use]
    pub fn comment_text_style(&self) -> RenderStyle {
        RenderStyle {
            box_color: Some(self.text.box_color.clone()),
            position: Position::MiddleCenter,
            ..self.body_style()
        }
    }

    #[must_use]
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            max_length: self.comments.length_max,
            comment_limit: self.comments.limit,
            removed_sentinels: self.comments.removed_sentinels.clone(),
            blocked_topics: self.comments.blocked_topics.clone(),
        }
    }

    #[must_use]
    pub fn assembler_limits(&self) -> AssemblerLimits {
        AssemblerLimits {
            max_video_length: self.video.max_video_length,
            comment_limit: self.comments.limit,
        }
    }
}

/// Return the path to the default config file.
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("threadreel")
        .join("config.toml")
}
