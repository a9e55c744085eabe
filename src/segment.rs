//! Narrated segments and the builder that produces them
//!
//! A [`SegmentDraft`] is a fully resolved segment that has not been placed
//! on the timeline yet. Only [`crate::timeline::TimelineAssembler`] turns a
//! draft into a [`Segment`] by giving it a start offset.
//!
//! The builder decides layout before it narrates, so a line or comment that
//! cannot be shown never costs a narration call.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collab::{MediaProbe, Narrator};
use crate::config::Settings;
use crate::error::{ReelError, Result};
use crate::layout::{fit_image, FrameSize, ImageFit, TextMetrics};
use crate::text::sanitize_text;
use crate::thread::Comment;

/// What a segment shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentKind {
    Title,
    BodyText,
    CommentImage,
    CommentText,
    Transition,
}

/// Placement on the frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    #[default]
    MiddleCenter,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    /// x, y in pixels, or fractions of the frame if both are < 1.0
    Custom(f32, f32),
}

impl Position {
    /// Coordinates for the ffmpeg `overlay` filter
    #[must_use]
    pub fn to_overlay_position(&self, margin: u32) -> (String, String) {
        self.expressions(margin, "overlay_w", "overlay_h", "main_w", "main_h")
    }

    /// Coordinates for the ffmpeg `drawtext` filter
    #[must_use]
    pub fn to_drawtext_position(&self, margin: u32) -> (String, String) {
        self.expressions(margin, "text_w", "text_h", "w", "h")
    }

    fn expressions(
        &self,
        margin: u32,
        item_w: &str,
        item_h: &str,
        frame_w: &str,
        frame_h: &str,
    ) -> (String, String) {
        let m = margin.to_string();
        let center_x = format!("({frame_w}-{item_w})/2");
        let center_y = format!("({frame_h}-{item_h})/2");
        let right = format!("{frame_w}-{item_w}-{m}");
        let bottom = format!("{frame_h}-{item_h}-{m}");

        match self {
            Self::TopLeft => (m.clone(), m),
            Self::TopCenter => (center_x, m),
            Self::TopRight => (right, m),
            Self::MiddleLeft => (m, center_y),
            Self::MiddleCenter => (center_x, center_y),
            Self::MiddleRight => (right, center_y),
            Self::BottomLeft => (m, bottom),
            Self::BottomCenter => (center_x, bottom),
            Self::BottomRight => (right, bottom),
            Self::Custom(x, y) => {
                if *x < 1.0 && *y < 1.0 {
                    (format!("{frame_w}*{x}"), format!("{frame_h}*{y}"))
                } else {
                    (format!("{x}"), format!("{y}"))
                }
            }
        }
    }
}

/// Font and placement for captions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderStyle {
    pub font: String,
    pub font_size: u32,
    pub color: String,
    /// Caption box colour; `None` draws text without a box
    pub box_color: Option<String>,
    pub opacity: f64,
    pub position: Position,
}

impl RenderStyle {
    /// Caption visual in this style
    #[must_use]
    pub fn caption(&self, text: impl Into<String>) -> Visual {
        Visual::Caption {
            text: text.into(),
            font: self.font.clone(),
            font_size: self.font_size,
            color: self.color.clone(),
            box_color: self.box_color.clone(),
        }
    }
}

/// Picture shown by a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Visual {
    /// Still image scaled to `size`
    Image { path: PathBuf, size: FrameSize },
    /// Rendered text
    Caption {
        text: String,
        font: String,
        font_size: u32,
        color: String,
        box_color: Option<String>,
    },
    /// Video clip played from its start
    Clip { path: PathBuf },
}

/// A segment that has not been placed yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDraft {
    pub kind: SegmentKind,
    /// Seconds, including the pause after narration
    pub duration: f64,
    pub visual: Visual,
    /// Narration file; transitions may carry their own clip audio or none
    pub audio: Option<PathBuf>,
    pub opacity: f64,
    pub position: Position,
    pub volume: f64,
    /// Comment id for comment segments
    pub unit: Option<String>,
}

/// A placed, immutable segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Seconds from the start of the video
    pub start: f64,
    pub duration: f64,
    pub visual: Visual,
    pub audio: Option<PathBuf>,
    /// Index among narrated segments, bottom to top
    pub order: usize,
    pub opacity: f64,
    pub position: Position,
    pub volume: f64,
    pub unit: Option<String>,
}

impl Segment {
    pub(crate) fn place(draft: SegmentDraft, start: f64, order: usize) -> Self {
        Self {
            kind: draft.kind,
            start,
            duration: draft.duration,
            visual: draft.visual,
            audio: draft.audio,
            order,
            opacity: draft.opacity,
            position: draft.position,
            volume: draft.volume,
            unit: draft.unit,
        }
    }

    /// Offset at which the segment stops showing
    #[must_use]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A synthesized narration file and its measured length
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationClip {
    pub path: PathBuf,
    pub duration: f64,
}

/// Per-kind narration volumes
#[derive(Debug, Clone, Copy, PartialEq)]
struct Volumes {
    title: f64,
    body: f64,
    comment: f64,
    transition: f64,
}

/// Builds segment drafts for titles, body lines, comments and transitions.
pub struct SegmentBuilder<'a> {
    narrator: &'a dyn Narrator,
    probe: &'a dyn MediaProbe,
    speech_dir: PathBuf,
    audio_extension: String,
    frame: FrameSize,
    pause: f64,
    metrics: TextMetrics,
    body_style: RenderStyle,
    comment_style: RenderStyle,
    image_opacity: f64,
    image_width: f64,
    volumes: Volumes,
}

impl<'a> SegmentBuilder<'a> {
    /// Create a builder writing narration files under `speech_dir`.
    pub fn new(
        settings: &Settings,
        narrator: &'a dyn Narrator,
        probe: &'a dyn MediaProbe,
        speech_dir: impl Into<PathBuf>,
    ) -> Self {
        let frame = settings.frame_size();
        Self {
            narrator,
            probe,
            speech_dir: speech_dir.into(),
            audio_extension: settings.narration.extension.clone(),
            frame,
            pause: settings.video.pause,
            metrics: settings.text_metrics(),
            body_style: settings.body_style(),
            comment_style: settings.comment_text_style(),
            image_opacity: settings.comments.opacity,
            image_width: settings.comments.width,
            volumes: Volumes {
                title: settings.narration.title_volume,
                body: settings.narration.body_volume,
                comment: settings.narration.comment_volume,
                transition: settings.video.transition_volume,
            },
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &TextMetrics {
        &self.metrics
    }

    /// Tallest caption that still fits the frame, in pixels
    #[must_use]
    pub fn max_text_height(&self) -> f64 {
        f64::from(self.frame.height)
    }

    /// Synthesize `text` into `<speech_dir>/<stem>.<ext>` and measure it.
    ///
    /// Any failure here is fatal for the run.
    pub fn narrate(&self, text: &str, stem: &str) -> Result<NarrationClip> {
        let path = self
            .speech_dir
            .join(format!("{stem}.{}", self.audio_extension));
        debug!(path = %path.display(), chars = text.chars().count(), "synthesizing narration");

        self.narrator
            .synthesize(text, &path)
            .map_err(|source| ReelError::Narration {
                path: path.clone(),
                source,
            })?;

        let info = self
            .probe
            .media_info(&path)
            .map_err(|e| ReelError::Narration {
                path: path.clone(),
                source: std::io::Error::other(e.to_string()),
            })?;

        Ok(NarrationClip {
            path,
            duration: info.duration,
        })
    }

    /// Title segment: the given image when it fits, otherwise a caption.
    pub fn title(&self, title: &str, image: Option<&Path>) -> Result<SegmentDraft> {
        let text = sanitize_text(title);
        let narration = self.narrate(&text, "title")?;

        let visual = image
            .and_then(|path| self.fitted_image(path))
            .unwrap_or_else(|| {
                info!("no usable title image, using caption");
                self.comment_style.caption(text.clone())
            });

        Ok(SegmentDraft {
            kind: SegmentKind::Title,
            duration: narration.duration + self.pause,
            visual,
            audio: Some(narration.path),
            opacity: self.image_opacity,
            position: Position::MiddleCenter,
            volume: self.volumes.title,
            unit: None,
        })
    }

    /// Body segment showing `caption` while narrating `line`.
    pub fn body_line(&self, caption: &str, line: &str, index: usize) -> Result<SegmentDraft> {
        let narration = self.narrate(line, &format!("selftext_{index}"))?;

        Ok(SegmentDraft {
            kind: SegmentKind::BodyText,
            duration: narration.duration + self.pause,
            visual: self.body_style.caption(caption),
            audio: Some(narration.path),
            opacity: self.body_style.opacity,
            position: self.body_style.position,
            volume: self.volumes.body,
            unit: None,
        })
    }

    /// Comment shown as its screenshot.
    ///
    /// Returns `None` when the screenshot is missing, unreadable or too tall.
    pub fn comment_image(
        &self,
        comment: &Comment,
        image: Option<&Path>,
    ) -> Result<Option<SegmentDraft>> {
        let Some(path) = image else {
            info!(id = %comment.id, "comment image not found");
            return Ok(None);
        };
        let Some(visual) = self.fitted_image(path) else {
            return Ok(None);
        };

        let narration = self.narrate(&comment.body, &comment.id)?;

        Ok(Some(SegmentDraft {
            kind: SegmentKind::CommentImage,
            duration: narration.duration + self.pause,
            visual,
            audio: Some(narration.path),
            opacity: self.image_opacity,
            position: Position::MiddleCenter,
            volume: self.volumes.comment,
            unit: Some(comment.id.clone()),
        }))
    }

    /// Whole comment as one centred caption, if it fits the frame.
    pub fn comment_block(&self, comment: &Comment) -> Result<Option<SegmentDraft>> {
        if !self.metrics.fits(&comment.body, self.max_text_height()) {
            debug!(id = %comment.id, "comment does not fit as one block");
            return Ok(None);
        }

        let narration = self.narrate(&comment.body, &comment.id)?;

        Ok(Some(SegmentDraft {
            kind: SegmentKind::CommentText,
            duration: narration.duration + self.pause,
            visual: self.comment_style.caption(comment.body.clone()),
            audio: Some(narration.path),
            opacity: self.comment_style.opacity,
            position: self.comment_style.position,
            volume: self.volumes.comment,
            unit: Some(comment.id.clone()),
        }))
    }

    /// One re-flowed line of a comment that was too long for a single block.
    pub fn comment_line(
        &self,
        comment: &Comment,
        caption: &str,
        line: &str,
        index: usize,
    ) -> Result<SegmentDraft> {
        let narration = self.narrate(line, &format!("{}_{index}", comment.id))?;

        Ok(SegmentDraft {
            kind: SegmentKind::CommentText,
            duration: narration.duration + self.pause,
            visual: self.body_style.caption(caption),
            audio: Some(narration.path),
            opacity: self.body_style.opacity,
            position: self.body_style.position,
            volume: self.volumes.comment,
            unit: Some(comment.id.clone()),
        })
    }

    /// Short clip between the body and the comments.
    ///
    /// The clip's own audio is used when it has any.
    #[must_use]
    pub fn transition(&self, clip: &Path, duration: f64, has_audio: bool) -> SegmentDraft {
        SegmentDraft {
            kind: SegmentKind::Transition,
            duration,
            visual: Visual::Clip {
                path: clip.to_path_buf(),
            },
            audio: has_audio.then(|| clip.to_path_buf()),
            opacity: 1.0,
            position: Position::MiddleCenter,
            volume: self.volumes.transition,
            unit: None,
        }
    }

    fn fitted_image(&self, path: &Path) -> Option<Visual> {
        if !path.exists() {
            info!(path = %path.display(), "image not found");
            return None;
        }

        let size = match self.probe.image_size(path) {
            Ok(size) => size,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read image");
                return None;
            }
        };

        match fit_image(size, self.frame, self.image_width) {
            ImageFit::Fits(scaled) => {
                debug!(path = %path.display(), from = %size, to = %scaled, "image fitted");
                Some(Visual::Image {
                    path: path.to_path_buf(),
                    size: scaled,
                })
            }
            ImageFit::Overflow(scaled) => {
                info!(path = %path.display(), size = %scaled, "image larger than frame height");
                None
            }
        }
    }
}
