use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Result};

use threadreel::collab::{FfmpegCompositor, FfmpegConfig};
use threadreel::{Collaborators, ReelPipeline};

use super::{load_inputs, seeded_rng};

pub fn cmd_build(
    thread: &Path,
    config: Option<&Path>,
    output: Option<PathBuf>,
    seed: Option<u64>,
    no_compile: bool,
    upload: bool,
) -> Result<()> {
    let (mut settings, thread) = load_inputs(thread, config)?;

    if let Some(dir) = output {
        settings.paths.video_dir = dir;
    }
    if no_compile {
        settings.features.compilation = false;
    }
    if upload {
        settings.features.upload = true;
    }

    // Fail before any narration is synthesized
    if settings.features.compilation {
        let compositor = FfmpegCompositor::new(FfmpegConfig::from_settings(&settings));
        if !compositor.check_available() {
            bail!("ffmpeg not found in PATH (use --no-compile to skip rendering)");
        }
    }

    eprintln!("🎬 Building: {}", thread.title);
    eprintln!("   Comments: {}", thread.comments.len());

    let collaborators = Collaborators::from_settings(&settings)?;
    let pipeline = ReelPipeline::new(settings, collaborators);

    let start = Instant::now();
    let result = pipeline.run(&thread, &mut seeded_rng(seed))?;
    let elapsed = start.elapsed();

    eprintln!("\n✅ Done in {:.1}s", elapsed.as_secs_f64());
    eprintln!("   Segments: {}", result.timeline.segments.len());
    eprintln!(
        "   Comments used: {}/{}",
        result
            .timeline
            .segments
            .iter()
            .filter_map(|s| s.unit.as_deref())
            .collect::<std::collections::BTreeSet<_>>()
            .len(),
        result.filter.accepted.len()
    );
    eprintln!("   Duration: {:.1}s", result.output.duration);
    eprintln!("   Metadata: {}", result.output.sidecar.display());

    if result.compiled {
        eprintln!("   Video: {}", result.output.file.display());
    }
    if result.published {
        eprintln!("   Published ✓");
    }

    Ok(())
}
