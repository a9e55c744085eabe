//! Thread-to-video pipeline
//!
//! Orchestrates one run: filter -> segments -> timeline -> output -> compose -> publish.
//!
//! Only a narration failure ends a run early. Missing screenshots, captions
//! that do not fit and a failing publisher are logged and skipped.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::collab::{
    CaptureRequest, CommandNarrator, CommandPublisher, Compositor, FfmpegCompositor,
    FfmpegConfig, FfprobeProbe, JsonLedger, Ledger, MediaProbe, Narrator, Publisher,
    ScreenshotCapture, ScreenshotSet, ScreenshotSource,
};
use crate::config::{CommentStyle, Orientation, Settings};
use crate::error::{ReelError, Result};
use crate::filter::{filter, FilterOutcome};
use crate::layout::reflow;
use crate::output::{Presentation, RunOutput, VideoMetadata};
use crate::segment::{Position, SegmentBuilder, SegmentDraft};
use crate::text::{narration_lines, random_lines};
use crate::thread::{Comment, Thread};
use crate::timeline::{
    centered_crop, fit_layer, AppendResult, LayerRole, LayerSource, LayerSpec, Layers, Timeline,
    TimelineAssembler, Transform,
};

/// External collaborators used by a run
pub struct Collaborators {
    pub narrator: Box<dyn Narrator>,
    pub probe: Box<dyn MediaProbe>,
    pub screenshots: Box<dyn ScreenshotSource>,
    pub compositor: Box<dyn Compositor>,
    pub ledger: Box<dyn Ledger>,
    pub publisher: Box<dyn Publisher>,
}

impl Collaborators {
    /// Command-line and file backed collaborators for `settings`.
    ///
    /// Fails when `ffprobe` is not installed.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            narrator: Box::new(CommandNarrator::from_settings(&settings.narration)),
            probe: Box::new(FfprobeProbe::new()?),
            screenshots: Box::new(ScreenshotCapture::new(settings.screenshots.command.clone())),
            compositor: Box::new(FfmpegCompositor::new(FfmpegConfig::from_settings(settings))),
            ledger: Box::new(JsonLedger::new(settings.paths.ledger.clone())),
            publisher: Box::new(CommandPublisher::from_settings(&settings.publish)),
        })
    }
}

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub timeline: Timeline,
    pub output: RunOutput,
    pub metadata: VideoMetadata,
    /// Comment filter outcome; empty when comments are disabled
    pub filter: FilterOutcome,
    pub compiled: bool,
    pub published: bool,
}

/// Timeline plus the run-level facts gathered while planning
struct Planned {
    timeline: Timeline,
    filter: FilterOutcome,
    description: String,
}

/// Builds videos from threads
pub struct ReelPipeline {
    settings: Settings,
    collab: Collaborators,
}

impl ReelPipeline {
    #[must_use]
    pub fn new(settings: Settings, collab: Collaborators) -> Self {
        Self { settings, collab }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build the timeline without writing or composing anything.
    pub fn plan<R: Rng + ?Sized>(&self, thread: &Thread, rng: &mut R) -> Result<Timeline> {
        Ok(self.assemble(thread, rng)?.timeline)
    }

    /// Run the full pipeline for one thread.
    pub fn run<R: Rng + ?Sized>(&self, thread: &Thread, rng: &mut R) -> Result<PipelineResult> {
        let planned = self.assemble(thread, rng)?;
        let features = self.settings.features;

        let presentation = Presentation {
            description: planned.description,
            thumbnail: self.settings.paths.thumbnail.clone(),
            video_dir: self.settings.paths.video_dir.join(&thread.id),
        };
        let output = RunOutput::finalize(&planned.timeline, thread, &presentation);

        let metadata = output.write_sidecar()?;
        info!(sidecar = %output.sidecar.display(), "metadata written");
        self.collab.ledger.append(&output.ledger_row)?;

        let compiled = if features.compilation {
            self.collab
                .compositor
                .compose(&planned.timeline, &output.file, self.settings.video.fps)?;
            self.collab.ledger.mark_compiled(&thread.id)?;
            true
        } else {
            info!("compilation disabled, skipping render");
            false
        };

        let published = if compiled && features.upload {
            self.publish(&output, &metadata)?
        } else {
            false
        };

        Ok(PipelineResult {
            timeline: planned.timeline,
            output,
            metadata,
            filter: planned.filter,
            compiled,
            published,
        })
    }

    fn assemble<R: Rng + ?Sized>(&self, thread: &Thread, rng: &mut R) -> Result<Planned> {
        let features = self.settings.features;
        log_thread(thread);

        let background = if features.background {
            self.choose_background(rng)
        } else {
            info!("background disabled, using colour");
            None
        };
        let description = self.description(rng);

        let speech_dir = self.settings.paths.speech_dir.join(&thread.id);
        let screenshot_dir = self.settings.paths.screenshot_dir.join(&thread.id);
        let builder = SegmentBuilder::new(
            &self.settings,
            &*self.collab.narrator,
            &*self.collab.probe,
            &speech_dir,
        );
        let mut assembler = TimelineAssembler::new(self.settings.assembler_limits());

        let title_image = self.title_image(thread, &screenshot_dir);
        let title = builder.title(&thread.title, title_image.as_deref())?;
        if !commit(&mut assembler, title) {
            warn!("title alone exceeds max_video_length");
        }
        assembler.mark_presenter_start();

        if features.selftext {
            if let Some(body) = thread.body_text() {
                info!(chars = body.chars().count(), "processing body text");
                self.add_body(&builder, &mut assembler, body)?;
                info!(duration = assembler.duration(), "finished body text");

                if features.transition {
                    if assembler.is_closed() {
                        info!("maximum video length already reached, skipping transition");
                    } else {
                        self.add_transition(&builder, &mut assembler);
                    }
                }
            }
        }

        let outcome = if features.comments {
            let outcome = filter(&thread.comments, &self.settings.filter_config());
            info!(
                accepted = outcome.accepted.len(),
                rejected = outcome.rejected.len(),
                "filtered comments"
            );

            match self.settings.comments.style {
                _ if assembler.is_closed() => {
                    info!("maximum video length already reached, skipping comments");
                }
                CommentStyle::Screenshot => {
                    let shots = self.capture(thread, &screenshot_dir, false, &outcome.accepted);
                    self.add_comment_images(&builder, &mut assembler, &outcome.accepted, &shots)?;
                }
                CommentStyle::Text => {
                    for comment in &outcome.accepted {
                        if !self.add_comment_text(&builder, &mut assembler, comment)? {
                            break;
                        }
                    }
                }
            }
            info!(
                used = assembler.comment_count(),
                accepted = outcome.accepted.len(),
                duration = assembler.duration(),
                "finished comments"
            );
            outcome
        } else {
            info!("comments disabled");
            FilterOutcome::default()
        };

        let duration = assembler.duration();
        if duration <= 0.0 {
            return Err(ReelError::Thread(format!(
                "nothing from thread {} fits within {} seconds",
                thread.id, self.settings.video.max_video_length
            )));
        }

        let layers = self.layers(background, duration, assembler.presenter_start())?;
        let timeline = assembler.finish(layers, self.settings.frame_size(), self.settings.video.fps);
        info!(
            segments = timeline.segments.len(),
            duration = timeline.duration,
            "timeline assembled"
        );

        Ok(Planned {
            timeline,
            filter: outcome,
            description,
        })
    }

    /// Pick a background from the sorted directory listing.
    fn choose_background<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<PathBuf> {
        let dir = &self.settings.background.directory;
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot list backgrounds, using colour");
                return None;
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        let chosen = files.choose(rng).cloned();
        match &chosen {
            Some(path) => info!(background = %path.display(), "selected background"),
            None => warn!(dir = %dir.display(), "no backgrounds found, using colour"),
        }
        chosen
    }

    fn description<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let referral = &self.settings.paths.referral_file;
        let mut description = match random_lines(referral, 1, rng) {
            Ok(line) => line,
            Err(e) => {
                warn!(file = %referral.display(), error = %e, "no referral line for description");
                String::new()
            }
        };

        if self.settings.publish.hashtag_shorts {
            description.push_str(" #shorts");
        }
        description
    }

    fn title_image(&self, thread: &Thread, screenshot_dir: &Path) -> Option<PathBuf> {
        if self.settings.screenshots.title_image {
            self.capture(thread, screenshot_dir, true, &[])
                .title()
                .map(Path::to_path_buf)
        } else {
            self.settings.paths.thumbnail.clone()
        }
    }

    fn capture(
        &self,
        thread: &Thread,
        output_dir: &Path,
        include_title: bool,
        comments: &[Comment],
    ) -> ScreenshotSet {
        let request = CaptureRequest {
            thread_id: thread.id.clone(),
            locator: thread.locator.clone(),
            output_dir: output_dir.to_path_buf(),
            include_title,
            comment_ids: comments.iter().map(|c| c.id.clone()).collect(),
        };

        self.collab
            .screenshots
            .capture(&request)
            .unwrap_or_else(|e| {
                warn!(error = %e, "screenshot capture failed");
                ScreenshotSet::default()
            })
    }

    fn add_body(
        &self,
        builder: &SegmentBuilder<'_>,
        assembler: &mut TimelineAssembler,
        body: &str,
    ) -> Result<()> {
        let mut buffer = String::new();

        for (index, line) in narration_lines(body).iter().enumerate() {
            let step = reflow(&buffer, line, builder.metrics(), builder.max_text_height());
            let Some(caption) = step.text().map(str::to_string) else {
                info!(index, "body line too tall for the frame, skipping");
                buffer.clear();
                continue;
            };

            let draft = builder.body_line(&caption, line, index)?;
            if !commit(assembler, draft) {
                break;
            }
            buffer = caption;
        }

        Ok(())
    }

    fn add_transition(&self, builder: &SegmentBuilder<'_>, assembler: &mut TimelineAssembler) {
        let clip = &self.settings.paths.transition_clip;
        if !clip.exists() {
            info!(clip = %clip.display(), "transition clip not found, skipping");
            return;
        }

        let has_audio = match self.collab.probe.media_info(clip) {
            Ok(info) => info.has_audio,
            Err(e) => {
                warn!(clip = %clip.display(), error = %e, "cannot probe transition clip, skipping");
                return;
            }
        };

        let draft = builder.transition(clip, self.settings.video.transition_duration, has_audio);
        commit(assembler, draft);
    }

    fn add_comment_images(
        &self,
        builder: &SegmentBuilder<'_>,
        assembler: &mut TimelineAssembler,
        comments: &[Comment],
        shots: &ScreenshotSet,
    ) -> Result<()> {
        for (count, comment) in comments.iter().enumerate() {
            info!(id = %comment.id, "processing comment {}/{}", count + 1, comments.len());

            let Some(draft) = builder.comment_image(comment, shots.get(&comment.id))? else {
                continue;
            };
            if !commit(assembler, draft) {
                break;
            }
        }
        Ok(())
    }

    /// Returns `false` once a cap stops the comment loop.
    fn add_comment_text(
        &self,
        builder: &SegmentBuilder<'_>,
        assembler: &mut TimelineAssembler,
        comment: &Comment,
    ) -> Result<bool> {
        info!(id = %comment.id, "processing comment");

        if let Some(draft) = builder.comment_block(comment)? {
            return Ok(commit(assembler, draft));
        }

        let mut buffer = String::new();
        for (index, line) in narration_lines(&comment.body).iter().enumerate() {
            let step = reflow(&buffer, line, builder.metrics(), builder.max_text_height());
            let Some(caption) = step.text().map(str::to_string) else {
                info!(id = %comment.id, index, "comment line too tall for the frame, skipping");
                buffer.clear();
                continue;
            };

            let draft = builder.comment_line(comment, &caption, line, index)?;
            if !commit(assembler, draft) {
                return Ok(false);
            }
            buffer = caption;
        }

        Ok(true)
    }

    fn layers(
        &self,
        background: Option<PathBuf>,
        duration: f64,
        presenter_start: f64,
    ) -> Result<Layers> {
        let settings = &self.settings;
        let frame = settings.frame_size();

        let (background_spec, background_info) = match background {
            Some(path) => {
                let info = self.collab.probe.media_info(&path)?;
                let mut transforms = Vec::new();
                if settings.video.orientation == Orientation::Portrait {
                    debug!("portrait mode, cropping and resizing background");
                    let crop = settings.background.crop.map_or_else(
                        || centered_crop(info.size(), frame),
                        |c| Transform::Crop {
                            x1: c.x1,
                            y1: c.y1,
                            x2: c.x2,
                            y2: c.y2,
                        },
                    );
                    transforms.push(crop);
                    transforms.push(Transform::Resize {
                        width: frame.width,
                        height: frame.height,
                    });
                }
                (
                    LayerSpec {
                        role: LayerRole::Background,
                        source: LayerSource::Video { path },
                        start: 0.0,
                        transforms,
                        opacity: settings.background.opacity,
                        volume: settings.background.volume,
                        position: Position::MiddleCenter,
                    },
                    Some(info),
                )
            }
            None => (
                LayerSpec {
                    role: LayerRole::Background,
                    source: LayerSource::Color {
                        color: settings.background.colour.clone(),
                        width: frame.width,
                        height: frame.height,
                    },
                    start: 0.0,
                    transforms: Vec::new(),
                    opacity: 1.0,
                    volume: 0.0,
                    position: Position::MiddleCenter,
                },
                None,
            ),
        };

        let background = fit_layer(background_spec, background_info.as_ref(), duration)?
            .ok_or_else(|| ReelError::Thread("timeline is empty".into()))?;

        let overlay = match (&settings.overlay.file, settings.features.overlay) {
            (Some(path), true) => {
                info!(overlay = %path.display(), "adding overlay");
                let info = self.collab.probe.media_info(path)?;
                let transforms = settings
                    .overlay
                    .size
                    .map(|size| Transform::Resize {
                        width: size.width,
                        height: size.height,
                    })
                    .into_iter()
                    .collect();
                fit_layer(
                    LayerSpec {
                        role: LayerRole::Overlay,
                        source: LayerSource::Video { path: path.clone() },
                        start: 0.0,
                        transforms,
                        opacity: settings.overlay.opacity,
                        volume: 0.0,
                        position: Position::MiddleCenter,
                    },
                    Some(&info),
                    duration,
                )?
            }
            (None, true) => {
                warn!("overlay enabled but no overlay file configured");
                None
            }
            _ => None,
        };

        let presenter = match (&settings.presenter.file, settings.features.presenter) {
            (Some(path), true) => {
                info!(presenter = %path.display(), start = presenter_start, "adding presenter");
                let info = self.collab.probe.media_info(path)?;
                let mut transforms = Vec::new();
                if let Some(size) = settings.presenter.size {
                    transforms.push(Transform::Resize {
                        width: size.width,
                        height: size.height,
                    });
                }
                if settings.presenter.remove_greenscreen {
                    transforms.push(Transform::ChromaKey {
                        color: settings.presenter.greenscreen_color.clone(),
                        similarity: settings.presenter.greenscreen_similarity,
                        blend: settings.presenter.greenscreen_blend,
                    });
                }
                fit_layer(
                    LayerSpec {
                        role: LayerRole::Presenter,
                        source: LayerSource::Video { path: path.clone() },
                        start: presenter_start,
                        transforms,
                        opacity: 1.0,
                        volume: 0.0,
                        position: settings.presenter.position,
                    },
                    Some(&info),
                    duration,
                )?
            }
            (None, true) => {
                warn!("presenter enabled but no presenter file configured");
                None
            }
            _ => None,
        };

        Ok(Layers {
            background,
            overlay,
            presenter,
        })
    }

    fn publish(&self, output: &RunOutput, metadata: &VideoMetadata) -> Result<bool> {
        let id = &output.ledger_row.id;

        if !self.collab.publisher.is_ready() {
            info!("publisher not ready, skipping upload");
            return Ok(false);
        }
        if self.collab.ledger.is_uploaded(id)? {
            info!(id, "already uploaded");
            return Ok(false);
        }

        match self.collab.publisher.publish(output, metadata) {
            Ok(()) => {
                self.collab.ledger.mark_uploaded(id)?;
                info!(id, "uploaded");
                Ok(true)
            }
            Err(e) => {
                warn!(id, error = %e, "upload failed");
                Ok(false)
            }
        }
    }
}

/// Append a draft; `false` means a cap was hit and the loop should stop.
///
/// A draft without a usable duration is dropped and the loop carries on.
fn commit(assembler: &mut TimelineAssembler, draft: SegmentDraft) -> bool {
    match assembler.append(draft) {
        AppendResult::Committed { .. } | AppendResult::RejectedInvalidDuration => true,
        AppendResult::RejectedDurationCap | AppendResult::RejectedCountCap => {
            debug!(duration = assembler.duration(), "cap reached, stopping");
            false
        }
    }
}

fn log_thread(thread: &Thread) {
    info!(
        id = %thread.id,
        title = %thread.title,
        locator = %thread.locator,
        comments = thread.comments.len(),
        "processing thread"
    );
    if let Some(community) = &thread.community {
        debug!(community, score = ?thread.score, nsfw = thread.nsfw, "thread details");
    }
}
