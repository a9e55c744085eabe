//! `threadreel` - Turn a discussion thread into a short narrated video
//!
//! # Features
//!
//! - **Comment filtering**: length, removed/deleted, blocked topics, pinned and link rules
//! - **Segments**: title, body text and comments narrated through any TTS command
//! - **Re-flow**: captions that outgrow the frame restart from the newest line
//! - **Timeline**: duration and comment caps, looped/trimmed background, overlay and presenter layers
//! - **Rendering**: one ffmpeg `-filter_complex` pass
//! - **Bookkeeping**: metadata sidecar, JSON lines ledger, optional publishing
//!
//! # Example
//!
//! ```rust,no_run
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use threadreel::{Collaborators, ReelPipeline, Settings, Thread};
//!
//! fn main() -> threadreel::Result<()> {
//!     let settings = Settings::load(None)?;
//!     let thread = Thread::load("thread.json")?;
//!
//!     let collaborators = Collaborators::from_settings(&settings)?;
//!     let pipeline = ReelPipeline::new(settings, collaborators);
//!     let result = pipeline.run(&thread, &mut StdRng::seed_from_u64(42))?;
//!
//!     println!("{} ({:.1}s)", result.output.file.display(), result.output.duration);
//!     Ok(())
//! }
//! ```

pub mod collab;
pub mod config;
pub mod error;
pub mod filter;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod segment;
pub mod text;
pub mod thread;
pub mod timeline;

pub use collab::{
    CaptureRequest, Compositor, Ledger, MediaInfo, MediaProbe, Narrator, Publisher, ScreenshotSet,
    ScreenshotSource,
};
pub use config::Settings;
pub use error::{ReelError, Result};
pub use filter::{classify, filter, FilterConfig, FilterOutcome, FilterVerdict, RejectReason};
pub use layout::{fit_image, reflow, FrameSize, ImageFit, Reflow, TextMetrics};
pub use output::{LedgerRow, Presentation, RunOutput, VideoMetadata};
pub use pipeline::{Collaborators, PipelineResult, ReelPipeline};
pub use segment::{Position, RenderStyle, Segment, SegmentBuilder, SegmentDraft, SegmentKind, Visual};
pub use thread::{Comment, Thread};
pub use timeline::{
    fit_layer, AppendResult, AssemblerLimits, LayerFit, LayerRole, LayerSource, LayerSpec,
    LayerTrack, Layers, Timeline, TimelineAssembler, Transform,
};

/// Version of threadreel
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
