//! ffmpeg-based compositor that renders a [`Timeline`] to a video file
//!
//! The whole timeline becomes one `-filter_complex` graph:
//! - a black canvas the length of the timeline is the first input
//! - every item of the composite order is overlaid onto the canvas in turn,
//!   enabled only between its start and end
//! - captions are drawn with `drawtext`
//! - narration and kept layer audio are delayed to their start and mixed
//!   with `amix`

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use super::Compositor;
use crate::config::Settings;
use crate::error::{ReelError, Result};
use crate::layout::{wrap_lines, FrameSize, TextMetrics};
use crate::segment::{Segment, Visual};
use crate::timeline::{CompositeItem, LayerFit, LayerRole, LayerSource, LayerTrack, Timeline, Transform};

/// Encoder settings for the compositor
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    /// Used to wrap captions the same way their height was estimated
    pub text_metrics: TextMetrics,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: which::which("ffmpeg").unwrap_or_else(|_| PathBuf::from("ffmpeg")),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "medium".to_string(),
            text_metrics: TextMetrics::default(),
        }
    }
}

impl FfmpegConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            video_codec: settings.video.video_codec.clone(),
            audio_codec: settings.video.audio_codec.clone(),
            preset: settings.video.preset.clone(),
            text_metrics: settings.text_metrics(),
            ..Self::default()
        }
    }
}

/// Inputs, filter graph and output labels for one render
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    /// `-i` arguments with their per-input options
    pub inputs: Vec<String>,
    pub filter_complex: String,
    pub video_label: String,
    pub audio_label: Option<String>,
}

#[derive(Default)]
struct Inputs {
    args: Vec<String>,
    count: usize,
}

impl Inputs {
    fn add(&mut self, options: &[&str], source: &str) -> usize {
        self.args.extend(options.iter().map(|o| (*o).to_string()));
        self.args.push("-i".to_string());
        self.args.push(source.to_string());
        self.count += 1;
        self.count - 1
    }

    fn add_path(&mut self, options: &[&str], path: &Path) -> usize {
        self.add(options, &path.to_string_lossy())
    }
}

/// [`Compositor`] that shells out to ffmpeg
pub struct FfmpegCompositor {
    config: FfmpegConfig,
}

impl FfmpegCompositor {
    #[must_use]
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// Check if ffmpeg is available
    #[must_use]
    pub fn check_available(&self) -> bool {
        Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    /// Build the filter graph for a timeline
    #[must_use]
    pub fn build_graph(&self, timeline: &Timeline, fps: u32) -> FilterGraph {
        let frame = timeline.frame;
        let total = timeline.duration;

        let mut inputs = Inputs::default();
        let mut chains = Vec::new();
        let mut audio = Vec::new();

        let canvas = inputs.add(
            &["-f", "lavfi"],
            &format!(
                "color=c=black:s={}x{}:r={fps}:d={}",
                frame.width,
                frame.height,
                secs(total)
            ),
        );
        let mut current = format!("[{canvas}:v]");

        for (step, item) in timeline.composite_order().into_iter().enumerate() {
            let next = format!("[c{step}]");

            match item {
                CompositeItem::Layer(layer) => {
                    let index = layer_input(&mut inputs, layer, fps);
                    let label = format!("[l{step}]");
                    chains.push(format!(
                        "[{index}:v]{}{label}",
                        layer_filters(layer, frame).join(",")
                    ));
                    let (x, y) = layer.position.to_overlay_position(0);
                    chains.push(format!(
                        "{current}{label}overlay=x={x}:y={y}:enable='{}'{next}",
                        between(layer.start, layer.end())
                    ));

                    if layer.keep_audio {
                        audio.push(format!(
                            "[{index}:a]atrim=duration={},asetpts=PTS-STARTPTS,volume={},{}",
                            secs(layer.duration),
                            layer.volume,
                            delay(layer.start)
                        ));
                    }
                }
                CompositeItem::Segment(segment) => {
                    match &segment.visual {
                        Visual::Caption { .. } => {
                            chains.push(format!(
                                "{current}{}{next}",
                                self.drawtext(segment)
                            ));
                        }
                        Visual::Image { path, size } => {
                            let index =
                                inputs.add_path(&["-loop", "1", "-t", &secs(segment.duration)], path);
                            let label = format!("[s{step}]");
                            chains.push(format!(
                                "[{index}:v]scale={}:{},{},setpts=PTS-STARTPTS+{}/TB{label}",
                                size.width,
                                size.height,
                                alpha(segment.opacity),
                                secs(segment.start)
                            ));
                            chains.push(overlay(&current, &label, segment, &next));
                        }
                        Visual::Clip { path } => {
                            let index = inputs.add_path(&[], path);
                            let label = format!("[s{step}]");
                            chains.push(format!(
                                "[{index}:v]trim=duration={},setpts=PTS-STARTPTS+{}/TB{label}",
                                secs(segment.duration),
                                secs(segment.start)
                            ));
                            chains.push(overlay(&current, &label, segment, &next));
                        }
                    }

                    if let Some(narration) = &segment.audio {
                        let index = inputs.add_path(&[], narration);
                        audio.push(format!(
                            "[{index}:a]atrim=duration={},asetpts=PTS-STARTPTS,volume={},{}",
                            secs(segment.duration),
                            segment.volume,
                            delay(segment.start)
                        ));
                    }
                }
            }

            current = next;
        }

        let audio_label = if audio.is_empty() {
            None
        } else {
            let mut labels = String::new();
            for (n, chain) in audio.iter().enumerate() {
                chains.push(format!("{chain}[a{n}]"));
                labels.push_str(&format!("[a{n}]"));
            }
            chains.push(format!(
                "{labels}amix=inputs={}:normalize=0:dropout_transition=0,atrim=duration={}[aout]",
                audio.len(),
                secs(total)
            ));
            Some("[aout]".to_string())
        };

        FilterGraph {
            inputs: inputs.args,
            filter_complex: chains.join(";"),
            video_label: current,
            audio_label,
        }
    }

    /// Build ffmpeg arguments
    #[must_use]
    pub fn build_args(&self, timeline: &Timeline, output: &Path, fps: u32) -> Vec<String> {
        let graph = self.build_graph(timeline, fps);
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "warning", "-stats"]
            .iter()
            .map(std::string::ToString::to_string)
            .collect();

        args.extend(graph.inputs);
        args.push("-filter_complex".to_string());
        args.push(graph.filter_complex);
        args.push("-map".to_string());
        args.push(graph.video_label);

        if let Some(audio) = graph.audio_label {
            args.push("-map".to_string());
            args.push(audio);
            args.push("-c:a".to_string());
            args.push(self.config.audio_codec.clone());
        } else {
            args.push("-an".to_string());
        }

        args.extend([
            "-c:v".to_string(),
            self.config.video_codec.clone(),
            "-preset".to_string(),
            self.config.preset.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            fps.to_string(),
            "-t".to_string(),
            secs(timeline.duration),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ]);

        args
    }

    fn drawtext(&self, segment: &Segment) -> String {
        let Visual::Caption {
            text,
            font,
            font_size,
            color,
            box_color,
        } = &segment.visual
        else {
            return String::new();
        };

        let metrics = TextMetrics {
            font_size: *font_size,
            ..self.config.text_metrics
        };
        let wrapped = wrap_lines(text, metrics.chars_per_line()).join("\n");
        let (x, y) = segment.position.to_drawtext_position(0);

        let mut params = vec![
            format!("drawtext=text={}", escape_text(&wrapped)),
            format!("font={}", escape_option(font)),
            format!("fontsize={font_size}"),
            format!("fontcolor={color}"),
            format!("alpha={}", segment.opacity),
            format!("x={x}"),
            format!("y={y}"),
        ];
        if let Some(box_color) = box_color {
            params.push(format!(
                "box=1:boxcolor={box_color}@{}:boxborderw=10",
                segment.opacity
            ));
        }
        params.push(format!(
            "enable='{}'",
            between(segment.start, segment.end())
        ));

        params.join(":")
    }
}

impl Compositor for FfmpegCompositor {
    fn compose(&self, timeline: &Timeline, output: &Path, fps: u32) -> Result<()> {
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let args = self.build_args(timeline, output, fps);
        debug!("ffmpeg args: {:?}", args);
        info!(
            output = %output.display(),
            duration = timeline.duration,
            segments = timeline.segments.len(),
            "compiling video, this takes a while"
        );

        let status = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| ReelError::MissingDependency(format!("failed to run ffmpeg: {e}")))?;

        if !status.success() {
            return Err(ReelError::Ffmpeg(format!("ffmpeg exited with status: {status}")));
        }

        info!("Composited video to {:?}", output);
        Ok(())
    }
}

fn layer_input(inputs: &mut Inputs, layer: &LayerTrack, fps: u32) -> usize {
    match (&layer.source, layer.fit) {
        (LayerSource::Color { color, width, height }, _) => inputs.add(
            &["-f", "lavfi"],
            &format!(
                "color=c={color}:s={width}x{height}:r={fps}:d={}",
                secs(layer.duration)
            ),
        ),
        (LayerSource::Video { path }, LayerFit::Loop { loops }) => {
            let extra = loops.saturating_sub(1).to_string();
            inputs.add_path(&["-stream_loop", &extra], path)
        }
        (LayerSource::Video { path }, _) => inputs.add_path(&[], path),
    }
}

fn layer_filters(layer: &LayerTrack, frame: FrameSize) -> Vec<String> {
    let mut filters = Vec::new();

    for transform in &layer.transforms {
        filters.push(match transform {
            Transform::Crop { x1, y1, x2, y2 } => format!(
                "crop={}:{}:{x1}:{y1}",
                x2.saturating_sub(*x1),
                y2.saturating_sub(*y1)
            ),
            Transform::Resize { width, height } => format!("scale={width}:{height}"),
            Transform::ChromaKey {
                color,
                similarity,
                blend,
            } => format!("format=rgba,colorkey={color}:{similarity}:{blend}"),
        });
    }

    if layer.role == LayerRole::Background && layer.frame_size != frame {
        filters.push(format!("scale={}:{}", frame.width, frame.height));
    }

    if layer.fit != LayerFit::Hold {
        filters.push(format!("trim=duration={}", secs(layer.duration)));
    }
    filters.push(format!("setpts=PTS-STARTPTS+{}/TB", secs(layer.start)));

    if layer.opacity < 1.0 {
        filters.push(alpha(layer.opacity));
    }

    filters
}

fn overlay(current: &str, label: &str, segment: &Segment, next: &str) -> String {
    let (x, y) = segment.position.to_overlay_position(0);
    format!(
        "{current}{label}overlay=x={x}:y={y}:enable='{}'{next}",
        between(segment.start, segment.end())
    )
}

fn alpha(opacity: f64) -> String {
    format!("format=rgba,colorchannelmixer=aa={opacity}")
}

fn delay(start: f64) -> String {
    let ms = (start * 1000.0).round() as u64;
    format!("adelay=delays={ms}:all=1")
}

fn between(start: f64, end: f64) -> String {
    format!("between(t,{},{})", secs(start), secs(end))
}

fn secs(value: f64) -> String {
    format!("{value:.3}")
}

/// Escape a caption for an unquoted drawtext `text=` value.
///
/// The value passes through the filtergraph parser, the option parser and
/// drawtext's own expansion, each of which consumes one level of backslashes.
fn escape_text(text: &str) -> String {
    escape_option(&escape_level(text, &['%']))
}

/// Escape an option value for the option parser and then the graph parser.
fn escape_option(value: &str) -> String {
    escape_level(&escape_level(value, &['\'', ':']), &['\'', '[', ']', ',', ';'])
}

fn escape_level(text: &str, specials: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\\' || specials.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
