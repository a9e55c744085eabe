//! Timeline assembly
//!
//! [`TimelineAssembler`] places narrated segments back to back and enforces
//! the duration ceiling and the comment count cap. Layer tracks
//! (background, overlay, presenter) are fitted afterwards with
//! [`fit_layer`] so they cover the narrated part of the video exactly.
//!
//! Composite order, bottom to top: background, overlay, segments in
//! chronological order, presenter.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collab::MediaInfo;
use crate::error::{ReelError, Result};
use crate::layout::FrameSize;
use crate::segment::{Position, Segment, SegmentDraft};

/// Caps applied while appending
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssemblerLimits {
    /// Ceiling on the summed duration of narrated segments, seconds
    pub max_video_length: f64,
    /// Number of distinct comments allowed on the timeline
    pub comment_limit: usize,
}

/// Outcome of [`TimelineAssembler::append`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppendResult {
    /// Segment placed at `start`; `cursor` is the next free offset.
    Committed { start: f64, cursor: f64 },
    RejectedDurationCap,
    RejectedCountCap,
    /// Duration was zero, negative or not finite; nothing changed.
    RejectedInvalidDuration,
}

impl AppendResult {
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Sequences narrated segments under the duration and count caps.
#[derive(Debug)]
pub struct TimelineAssembler {
    limits: AssemblerLimits,
    segments: Vec<Segment>,
    cursor: f64,
    duration: f64,
    closed: bool,
    units: BTreeSet<String>,
    presenter_start: Option<f64>,
}

impl TimelineAssembler {
    #[must_use]
    pub fn new(limits: AssemblerLimits) -> Self {
        Self {
            limits,
            segments: Vec::new(),
            cursor: 0.0,
            duration: 0.0,
            closed: false,
            units: BTreeSet::new(),
            presenter_start: None,
        }
    }

    /// Place `draft` at the cursor, unless a cap forbids it.
    ///
    /// The duration check is `duration + draft.duration > max_video_length`.
    /// The first duration rejection closes the assembler; every later append
    /// is rejected the same way. Drafts without a positive, finite duration
    /// are refused before any cap is checked.
    pub fn append(&mut self, draft: SegmentDraft) -> AppendResult {
        if self.closed {
            return AppendResult::RejectedDurationCap;
        }

        if !draft.duration.is_finite() || draft.duration <= 0.0 {
            warn!(kind = ?draft.kind, duration = draft.duration, "segment has no usable duration");
            return AppendResult::RejectedInvalidDuration;
        }

        if self.duration + draft.duration > self.limits.max_video_length {
            info!(
                duration = self.duration,
                next = draft.duration,
                max = self.limits.max_video_length,
                "reached maximum video length"
            );
            self.closed = true;
            return AppendResult::RejectedDurationCap;
        }

        if let Some(unit) = &draft.unit {
            if !self.units.contains(unit) && self.units.len() >= self.limits.comment_limit {
                info!(limit = self.limits.comment_limit, "reached comment limit");
                return AppendResult::RejectedCountCap;
            }
            self.units.insert(unit.clone());
        }

        let start = self.cursor;
        self.cursor += draft.duration;
        self.duration += draft.duration;

        debug!(
            kind = ?draft.kind,
            start,
            duration = draft.duration,
            total = self.duration,
            "segment committed"
        );

        let order = self.segments.len();
        self.segments.push(Segment::place(draft, start, order));

        AppendResult::Committed {
            start,
            cursor: self.cursor,
        }
    }

    /// Record the current cursor as the presenter's start.
    pub fn mark_presenter_start(&mut self) {
        self.presenter_start = Some(self.cursor);
    }

    #[must_use]
    pub fn presenter_start(&self) -> f64 {
        self.presenter_start.unwrap_or(0.0)
    }

    #[must_use]
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of distinct comments committed so far
    #[must_use]
    pub fn comment_count(&self) -> usize {
        self.units.len()
    }

    /// Freeze the timeline with its layer tracks.
    #[must_use]
    pub fn finish(self, layers: Layers, frame: FrameSize, fps: u32) -> Timeline {
        Timeline {
            segments: self.segments,
            background: layers.background,
            overlay: layers.overlay,
            presenter: layers.presenter,
            duration: self.duration,
            max_duration: self.limits.max_video_length,
            presenter_start: self.presenter_start.unwrap_or(0.0),
            frame,
            fps,
        }
    }
}

/// Which decorative layer a track is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerRole {
    Background,
    Overlay,
    Presenter,
}

/// Where a layer's pictures come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LayerSource {
    Video { path: PathBuf },
    Color { color: String, width: u32, height: u32 },
}

/// How a layer source is stretched to the required duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum LayerFit {
    /// Repeat the source `loops` times, then cut to the exact duration
    Loop { loops: u32 },
    /// Cut the source to the exact duration
    Trim,
    /// Still source shown for the whole duration
    Hold,
}

/// Frame transform applied before the duration fit, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Transform {
    Crop { x1: u32, y1: u32, x2: u32, y2: u32 },
    Resize { width: u32, height: u32 },
    /// Make pixels close to `color` transparent
    ChromaKey {
        color: String,
        similarity: f64,
        blend: f64,
    },
}

impl Transform {
    /// Frame size after this transform
    #[must_use]
    pub fn apply(&self, size: FrameSize) -> FrameSize {
        match self {
            Self::Crop { x1, y1, x2, y2 } => {
                FrameSize::new(x2.saturating_sub(*x1), y2.saturating_sub(*y1))
            }
            Self::Resize { width, height } => FrameSize::new(*width, *height),
            Self::ChromaKey { .. } => size,
        }
    }
}

/// Centred crop of `source` to the aspect ratio of `target`
#[must_use]
pub fn centered_crop(source: FrameSize, target: FrameSize) -> Transform {
    let target_aspect = target.aspect();
    let (width, height) = if target_aspect <= 0.0 || source.aspect() > target_aspect {
        let width = (f64::from(source.height) * target_aspect).round() as u32;
        (width.min(source.width), source.height)
    } else {
        let height = (f64::from(source.width) / target_aspect).round() as u32;
        (source.width, height.min(source.height))
    };

    let x1 = (source.width - width) / 2;
    let y1 = (source.height - height) / 2;
    Transform::Crop {
        x1,
        y1,
        x2: x1 + width,
        y2: y1 + height,
    }
}

/// A layer before it is fitted to the timeline
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub role: LayerRole,
    pub source: LayerSource,
    pub start: f64,
    pub transforms: Vec<Transform>,
    pub opacity: f64,
    pub volume: f64,
    pub position: Position,
}

/// A decorative layer covering `[start, start + duration]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerTrack {
    pub role: LayerRole,
    pub source: LayerSource,
    pub start: f64,
    /// Exact seconds shown
    pub duration: f64,
    pub fit: LayerFit,
    pub transforms: Vec<Transform>,
    /// Frame size after transforms
    pub frame_size: FrameSize,
    pub opacity: f64,
    pub volume: f64,
    pub position: Position,
    /// Whether the source's own audio is kept
    pub keep_audio: bool,
}

impl LayerTrack {
    #[must_use]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Fit a layer to cover `[spec.start, timeline_duration]`.
///
/// Video sources need `info`. Shorter sources loop
/// `ceil(required / source)` times and are cut to exactly `required`;
/// longer or equal ones are trimmed. Looped sources lose their audio.
/// Returns `Ok(None)` when nothing is left to cover.
pub fn fit_layer(
    spec: LayerSpec,
    info: Option<&MediaInfo>,
    timeline_duration: f64,
) -> Result<Option<LayerTrack>> {
    let required = timeline_duration - spec.start;
    if required <= 0.0 {
        debug!(role = ?spec.role, start = spec.start, "layer starts after the timeline ends");
        return Ok(None);
    }

    let (fit, source_size, keep_audio) = match &spec.source {
        LayerSource::Color { width, height, .. } => {
            (LayerFit::Hold, FrameSize::new(*width, *height), false)
        }
        LayerSource::Video { path } => {
            let info = info.ok_or_else(|| {
                ReelError::Probe(format!("no media info for layer {}", path.display()))
            })?;
            if info.duration <= 0.0 {
                return Err(ReelError::Probe(format!(
                    "layer {} has no duration",
                    path.display()
                )));
            }

            if info.duration < required {
                let loops = (required / info.duration).ceil() as u32;
                debug!(role = ?spec.role, loops, source = info.duration, required, "looping layer");
                (LayerFit::Loop { loops }, info.size(), false)
            } else {
                debug!(role = ?spec.role, source = info.duration, required, "trimming layer");
                (LayerFit::Trim, info.size(), info.has_audio)
            }
        }
    };

    let frame_size = spec
        .transforms
        .iter()
        .fold(source_size, |size, transform| transform.apply(size));

    Ok(Some(LayerTrack {
        role: spec.role,
        source: spec.source,
        start: spec.start,
        duration: required,
        fit,
        transforms: spec.transforms,
        frame_size,
        opacity: spec.opacity,
        volume: spec.volume,
        position: spec.position,
        keep_audio: keep_audio && spec.volume > 0.0,
    }))
}

/// Fitted layer tracks for a timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Layers {
    pub background: LayerTrack,
    pub overlay: Option<LayerTrack>,
    pub presenter: Option<LayerTrack>,
}

/// One entry of the composite stack
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompositeItem<'a> {
    Layer(&'a LayerTrack),
    Segment(&'a Segment),
}

/// A finished, read-only timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub segments: Vec<Segment>,
    pub background: LayerTrack,
    pub overlay: Option<LayerTrack>,
    pub presenter: Option<LayerTrack>,
    /// Summed duration of narrated segments, seconds
    pub duration: f64,
    pub max_duration: f64,
    pub presenter_start: f64,
    pub frame: FrameSize,
    pub fps: u32,
}

impl Timeline {
    /// Everything to draw, bottom to top.
    #[must_use]
    pub fn composite_order(&self) -> Vec<CompositeItem<'_>> {
        let mut items = Vec::with_capacity(self.segments.len() + 3);
        items.push(CompositeItem::Layer(&self.background));
        if let Some(overlay) = &self.overlay {
            items.push(CompositeItem::Layer(overlay));
        }
        items.extend(self.segments.iter().map(CompositeItem::Segment));
        if let Some(presenter) = &self.presenter {
            items.push(CompositeItem::Layer(presenter));
        }
        items
    }
}
