//! Media probing via ffprobe and the `image` crate

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use super::{MediaInfo, MediaProbe};
use crate::error::{ReelError, Result};
use crate::layout::FrameSize;

/// [`MediaProbe`] backed by `ffprobe -of json`
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe: PathBuf,
}

impl FfprobeProbe {
    /// Locate `ffprobe` on `PATH`.
    pub fn new() -> Result<Self> {
        let ffprobe = which::which("ffprobe")
            .map_err(|_| ReelError::MissingDependency("ffprobe not found in PATH".into()))?;
        Ok(Self { ffprobe })
    }

    #[must_use]
    pub fn with_binary(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }
}

impl MediaProbe for FfprobeProbe {
    fn media_info(&self, path: &Path) -> Result<MediaInfo> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| ReelError::Probe(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ReelError::Probe(format!(
                "ffprobe failed for {}",
                path.display()
            )));
        }

        let info = parse_ffprobe(&output.stdout)?;
        debug!(
            path = %path.display(),
            duration = info.duration,
            size = %info.size(),
            audio = info.has_audio,
            "probed media"
        );
        Ok(info)
    }

    fn image_size(&self, path: &Path) -> Result<FrameSize> {
        let (width, height) = image::image_dimensions(path)?;
        Ok(FrameSize::new(width, height))
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -show_format -show_streams -of json` output.
fn parse_ffprobe(stdout: &[u8]) -> Result<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    // Container duration first, stream duration for raw streams without one
    let duration = probe
        .format
        .duration
        .as_deref()
        .or_else(|| probe.streams.iter().find_map(|s| s.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| ReelError::Probe("no duration in ffprobe output".into()))?;

    Ok(MediaInfo {
        duration,
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        has_audio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_video_with_audio() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 3413, "height": 1920, "duration": "59.9"},
                {"codec_type": "audio", "duration": "60.0"}
            ],
            "format": {"duration": "60.021000"}
        }"#;

        let info = parse_ffprobe(json).unwrap();
        assert!((info.duration - 60.021).abs() < 1e-9);
        assert_eq!(info.size(), FrameSize::new(3413, 1920));
        assert!(info.has_audio);
    }

    #[test]
    fn parses_audio_only() {
        let json = br#"{
            "streams": [{"codec_type": "audio", "duration": "4.5"}],
            "format": {}
        }"#;

        let info = parse_ffprobe(json).unwrap();
        assert!((info.duration - 4.5).abs() < 1e-9);
        assert_eq!(info.width, 0);
        assert!(info.has_audio);
    }

    #[test]
    fn missing_duration_is_an_error() {
        let json = br#"{"streams": [], "format": {}}"#;
        assert!(matches!(parse_ffprobe(json), Err(ReelError::Probe(_))));
    }

    #[test]
    fn reads_image_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        image::RgbImage::new(40, 20).save(&path).unwrap();

        let probe = FfprobeProbe::with_binary("ffprobe");
        assert_eq!(probe.image_size(&path).unwrap(), FrameSize::new(40, 20));
    }
}
