//! Run artifacts: output paths, the metadata sidecar and the ledger row.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::text::sanitize_text;
use crate::thread::Thread;
use crate::timeline::Timeline;

const VIDEO_FILE: &str = "final.mp4";
const SIDECAR_FILE: &str = "meta.json";

/// Run-level facts that do not come from the timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub description: String,
    pub thumbnail: Option<PathBuf>,
    pub video_dir: PathBuf,
}

/// Metadata sidecar written next to the video; every field is a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub file: String,
    pub duration: String,
    pub height: String,
    pub width: String,
}

/// One ledger record per thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub id: String,
    pub title: String,
    pub thumbnail: Option<PathBuf>,
    pub file: PathBuf,
    pub duration: f64,
    pub compiled: bool,
    pub uploaded: bool,
}

/// Everything a run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub title: String,
    pub description: String,
    pub thumbnail: Option<PathBuf>,
    pub file: PathBuf,
    pub sidecar: PathBuf,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub ledger_row: LedgerRow,
}

impl RunOutput {
    /// Derive the run output from a finished timeline. Pure.
    #[must_use]
    pub fn finalize(timeline: &Timeline, thread: &Thread, presentation: &Presentation) -> Self {
        let title = sanitize_text(&thread.title);
        let file = presentation.video_dir.join(VIDEO_FILE);
        let sidecar = presentation.video_dir.join(SIDECAR_FILE);

        let ledger_row = LedgerRow {
            id: thread.id.clone(),
            title: title.clone(),
            thumbnail: presentation.thumbnail.clone(),
            file: file.clone(),
            duration: timeline.duration,
            compiled: false,
            uploaded: false,
        };

        Self {
            title,
            description: presentation.description.clone(),
            thumbnail: presentation.thumbnail.clone(),
            file,
            sidecar,
            duration: timeline.duration,
            width: timeline.frame.width,
            height: timeline.frame.height,
            ledger_row,
        }
    }

    /// Sidecar record for the compositor and publisher.
    #[must_use]
    pub fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            thumbnail: self
                .thumbnail
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            file: self.file.display().to_string(),
            duration: self.duration.to_string(),
            height: self.height.to_string(),
            width: self.width.to_string(),
        }
    }

    /// Write the sidecar as pretty JSON, creating the video directory.
    pub fn write_sidecar(&self) -> Result<VideoMetadata> {
        let metadata = self.metadata();
        if let Some(dir) = self.sidecar.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&metadata)?;
        std::fs::write(&self.sidecar, json)?;
        Ok(metadata)
    }
}

/// Read a sidecar back.
pub fn read_sidecar(path: &Path) -> Result<VideoMetadata> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FrameSize;
    use crate::segment::Position;
    use crate::timeline::{
        AssemblerLimits, LayerRole, LayerSource, LayerSpec, Layers, TimelineAssembler,
    };

    fn timeline() -> Timeline {
        let assembler = TimelineAssembler::new(AssemblerLimits {
            max_video_length: 60.0,
            comment_limit: 10,
        });
        let background = crate::timeline::fit_layer(
            LayerSpec {
                role: LayerRole::Background,
                source: LayerSource::Color {
                    color: "black".to_string(),
                    width: 1080,
                    height: 1920,
                },
                start: 0.0,
                transforms: Vec::new(),
                opacity: 1.0,
                volume: 0.0,
                position: Position::MiddleCenter,
            },
            None,
            1.0,
        )
        .unwrap()
        .unwrap();

        let mut timeline = assembler.finish(
            Layers {
                background,
                overlay: None,
                presenter: None,
            },
            FrameSize::new(1080, 1920),
            24,
        );
        timeline.duration = 12.5;
        timeline
    }

    fn thread() -> Thread {
        Thread::from_json_str(r#"{"id": "abc", "title": "Tom &amp; Jerry"}"#).unwrap()
    }

    fn presentation(dir: &Path) -> Presentation {
        Presentation {
            description: "Try it #shorts".to_string(),
            thumbnail: Some(PathBuf::from("thumbs/abc.png")),
            video_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn finalize_derives_paths_and_row() {
        let out = RunOutput::finalize(&timeline(), &thread(), &presentation(Path::new("/v/abc")));

        assert_eq!(out.file, PathBuf::from("/v/abc/final.mp4"));
        assert_eq!(out.sidecar, PathBuf::from("/v/abc/meta.json"));
        assert_eq!(out.title, "Tom & Jerry");
        assert_eq!((out.width, out.height), (1080, 1920));
        assert!(!out.ledger_row.compiled);
        assert!(!out.ledger_row.uploaded);
        assert_eq!(out.ledger_row.id, "abc");
    }

    #[test]
    fn finalize_is_idempotent() {
        let timeline = timeline();
        let thread = thread();
        let presentation = presentation(Path::new("/v/abc"));

        let first = RunOutput::finalize(&timeline, &thread, &presentation);
        let second = RunOutput::finalize(&timeline, &thread, &presentation);

        assert_eq!(first, second);
        assert_eq!(first.metadata(), second.metadata());
    }

    #[test]
    fn metadata_fields_are_strings() {
        let out = RunOutput::finalize(&timeline(), &thread(), &presentation(Path::new("/v/abc")));
        let value = serde_json::to_value(out.metadata()).unwrap();

        for key in ["title", "description", "thumbnail", "file", "duration", "height", "width"] {
            assert!(value[key].is_string(), "{key} should be a string");
        }
        assert_eq!(value["duration"], "12.5");
        assert_eq!(value["height"], "1920");
    }

    #[test]
    fn sidecar_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let out = RunOutput::finalize(&timeline(), &thread(), &presentation(&dir.path().join("abc")));

        let written = out.write_sidecar().unwrap();
        assert_eq!(read_sidecar(&out.sidecar).unwrap(), written);
    }
}
