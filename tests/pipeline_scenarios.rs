//! End-to-end pipeline runs against in-memory collaborators.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use threadreel::config::CommentStyle;
use threadreel::{
    CaptureRequest, Collaborators, Comment, Compositor, FrameSize, Ledger, LedgerRow, MediaInfo,
    MediaProbe, Narrator, Publisher, ReelError, ReelPipeline, RejectReason, Result, RunOutput,
    ScreenshotSet, ScreenshotSource, SegmentKind, Settings, Thread, Timeline, VideoMetadata,
    Visual,
};

/// Everything the fakes record
#[derive(Default)]
struct Record {
    narrated: Vec<String>,
    composed: Vec<PathBuf>,
    ledger: Vec<LedgerRow>,
    published: usize,
}

type Shared = Rc<RefCell<Record>>;

struct FakeNarrator {
    record: Shared,
    fail: bool,
}

impl Narrator for FakeNarrator {
    fn synthesize(&self, text: &str, _output: &Path) -> std::io::Result<()> {
        if self.fail {
            return Err(std::io::Error::other("tts engine crashed"));
        }
        self.record.borrow_mut().narrated.push(text.to_string());
        Ok(())
    }
}

/// Every audio file lasts five seconds, except `silent.*` which is empty
struct FakeProbe;

impl MediaProbe for FakeProbe {
    fn media_info(&self, path: &Path) -> Result<MediaInfo> {
        let silent = path.file_stem().is_some_and(|stem| stem == "silent");
        Ok(MediaInfo {
            duration: if silent { 0.0 } else { 5.0 },
            width: 1920,
            height: 1080,
            has_audio: true,
        })
    }

    fn image_size(&self, _path: &Path) -> Result<FrameSize> {
        Ok(FrameSize::new(1000, 300))
    }
}

/// Returns whatever files already exist
struct DirShots;

impl ScreenshotSource for DirShots {
    fn capture(&self, request: &CaptureRequest) -> Result<ScreenshotSet> {
        Ok(threadreel::collab::screenshot::scan(request))
    }
}

struct FakeCompositor {
    record: Shared,
}

impl Compositor for FakeCompositor {
    fn compose(&self, _timeline: &Timeline, output: &Path, _fps: u32) -> Result<()> {
        self.record.borrow_mut().composed.push(output.to_path_buf());
        Ok(())
    }
}

struct FakeLedger {
    record: Shared,
}

impl Ledger for FakeLedger {
    fn append(&self, row: &LedgerRow) -> Result<()> {
        self.record.borrow_mut().ledger.push(row.clone());
        Ok(())
    }

    fn is_uploaded(&self, id: &str) -> Result<bool> {
        Ok(self
            .record
            .borrow()
            .ledger
            .iter()
            .any(|r| r.id == id && r.uploaded))
    }

    fn mark_uploaded(&self, id: &str) -> Result<()> {
        for row in self.record.borrow_mut().ledger.iter_mut().filter(|r| r.id == id) {
            row.uploaded = true;
        }
        Ok(())
    }

    fn mark_compiled(&self, id: &str) -> Result<()> {
        for row in self.record.borrow_mut().ledger.iter_mut().filter(|r| r.id == id) {
            row.compiled = true;
        }
        Ok(())
    }
}

struct FakePublisher {
    record: Shared,
    ready: bool,
    fail: bool,
}

impl Publisher for FakePublisher {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn publish(&self, _output: &RunOutput, _metadata: &VideoMetadata) -> Result<()> {
        if self.fail {
            return Err(ReelError::Io(std::io::Error::other("quota exceeded")));
        }
        self.record.borrow_mut().published += 1;
        Ok(())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    record: Shared,
    pipeline: ReelPipeline,
}

fn settings(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.paths.speech_dir = dir.join("speech");
    settings.paths.screenshot_dir = dir.join("screenshots");
    settings.paths.video_dir = dir.join("videos");
    settings.paths.referral_file = dir.join("referral.txt");
    settings.paths.transition_clip = dir.join("static.mp4");
    settings.background.directory = dir.join("backgrounds");
    settings.comments.style = CommentStyle::Text;
    settings.screenshots.title_image = false;
    settings
}

/// Collaborators that should fail
#[derive(Default, Clone, Copy)]
struct Faults {
    narration: bool,
    publish: bool,
}

fn harness_with(configure: impl FnOnce(&mut Settings, &Path), faults: Faults) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path());
    configure(&mut settings, dir.path());

    let record: Shared = Rc::default();
    let collaborators = Collaborators {
        narrator: Box::new(FakeNarrator {
            record: Rc::clone(&record),
            fail: faults.narration,
        }),
        probe: Box::new(FakeProbe),
        screenshots: Box::new(DirShots),
        compositor: Box::new(FakeCompositor {
            record: Rc::clone(&record),
        }),
        ledger: Box::new(FakeLedger {
            record: Rc::clone(&record),
        }),
        publisher: Box::new(FakePublisher {
            record: Rc::clone(&record),
            ready: true,
            fail: faults.publish,
        }),
    };

    Harness {
        _dir: dir,
        record,
        pipeline: ReelPipeline::new(settings, collaborators),
    }
}

fn harness(configure: impl FnOnce(&mut Settings, &Path)) -> Harness {
    harness_with(configure, Faults::default())
}

fn thread(comments: Vec<Comment>) -> Thread {
    Thread {
        id: "abc123".to_string(),
        title: "Hello World".to_string(),
        body: None,
        comments,
        locator: "https://www.reddit.com/r/AskReddit/comments/abc123/hello_world/".to_string(),
        community: None,
        score: None,
        nsfw: false,
    }
}

fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

fn captions(timeline: &Timeline, kind: SegmentKind) -> Vec<&str> {
    timeline
        .segments
        .iter()
        .filter(|s| s.kind == kind)
        .filter_map(|s| match &s.visual {
            Visual::Caption { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn long_comment_is_rejected_and_one_comment_is_used() {
    let h = harness(|_, _| {});
    let thread = thread(vec![
        Comment::new("c1", "x".repeat(50)),
        Comment::new("c2", "y".repeat(6000)),
    ]);

    let result = h.pipeline.run(&thread, &mut rng()).unwrap();

    assert_eq!(result.filter.accepted.len(), 1);
    assert_eq!(result.filter.accepted[0].id, "c1");
    assert_eq!(result.filter.rejected.len(), 1);
    assert_eq!(result.filter.rejected[0].0.id, "c2");
    assert_eq!(result.filter.rejected[0].1, RejectReason::TooLong);

    let kinds: Vec<SegmentKind> = result.timeline.segments.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![SegmentKind::Title, SegmentKind::CommentText]);
    assert!((result.timeline.duration - 12.0).abs() < 1e-9);
}

#[test]
fn deleted_comment_is_rejected() {
    let h = harness(|_, _| {});
    let thread = thread(vec![Comment::new("gone", "[deleted]")]);

    let result = h.pipeline.run(&thread, &mut rng()).unwrap();

    assert!(result.filter.accepted.is_empty());
    assert_eq!(result.filter.rejected[0].1, RejectReason::RemovedOrDeleted);
    assert_eq!(result.timeline.segments.len(), 1);
}

#[test]
fn duration_cap_stops_comments() {
    let h = harness(|settings, _| settings.video.max_video_length = 40.0);
    let comments = (0..10)
        .map(|i| Comment::new(format!("c{i}"), format!("Comment number {i}")))
        .collect();

    let result = h.pipeline.run(&thread(comments), &mut rng()).unwrap();
    let timeline = &result.timeline;

    // title 6s + five comments of 6s = 36s; a sixth would reach 42s
    assert_eq!(result.filter.accepted.len(), 10);
    assert_eq!(timeline.segments.len(), 6);
    assert!((timeline.duration - 36.0).abs() < 1e-9);
    assert!(timeline.duration <= 40.0);

    // the sixth comment is narrated before its duration is known
    assert_eq!(h.record.borrow().narrated.len(), 7);

    for pair in timeline.segments.windows(2) {
        assert!(pair[0].start + pair[0].duration <= pair[1].start + 1e-9);
    }
}

#[test]
fn comment_limit_caps_distinct_comments() {
    let h = harness(|settings, _| settings.comments.limit = 3);
    let comments = (0..8)
        .map(|i| Comment::new(format!("c{i}"), "short and sweet"))
        .collect();

    let result = h.pipeline.run(&thread(comments), &mut rng()).unwrap();

    assert_eq!(result.filter.accepted.len(), 3);
    assert_eq!(result.timeline.segments.len(), 4);
}

#[test]
fn body_lines_precede_transition_and_comments() {
    let h = harness(|_, dir| {
        std::fs::write(dir.join("static.mp4"), b"clip").unwrap();
    });
    let mut thread = thread(vec![Comment::new("c1", "Agreed")]);
    thread.body = Some("First line\n&#x200B;\n\nSecond line".to_string());

    let result = h.pipeline.run(&thread, &mut rng()).unwrap();
    let kinds: Vec<SegmentKind> = result.timeline.segments.iter().map(|s| s.kind).collect();

    assert_eq!(
        kinds,
        vec![
            SegmentKind::Title,
            SegmentKind::BodyText,
            SegmentKind::BodyText,
            SegmentKind::Transition,
            SegmentKind::CommentText,
        ]
    );
    assert!((result.timeline.presenter_start - 6.0).abs() < 1e-9);
    assert!((result.timeline.duration - 25.0).abs() < 1e-9);
}

#[test]
fn screenshot_comments_without_images_are_skipped() {
    let h = harness(|settings, dir| {
        settings.comments.style = CommentStyle::Screenshot;
        let shots = dir.join("screenshots").join("abc123");
        std::fs::create_dir_all(&shots).unwrap();
        std::fs::write(shots.join("comment_c2.png"), b"png").unwrap();
    });
    let thread = thread(vec![
        Comment::new("c1", "No picture of me"),
        Comment::new("c2", "Picture of me"),
    ]);

    let result = h.pipeline.run(&thread, &mut rng()).unwrap();
    let units: Vec<Option<&str>> = result
        .timeline
        .segments
        .iter()
        .map(|s| s.unit.as_deref())
        .collect();

    assert_eq!(units, vec![None, Some("c2")]);
    assert_eq!(result.timeline.segments[1].kind, SegmentKind::CommentImage);
    // c1 was never narrated
    assert!(!h
        .record
        .borrow()
        .narrated
        .iter()
        .any(|t| t == "No picture of me"));
}

#[test]
fn narration_failure_aborts_the_run() {
    let h = harness_with(
        |_, _| {},
        Faults {
            narration: true,
            ..Faults::default()
        },
    );
    let thread = thread(vec![Comment::new("c1", "hello")]);

    let err = h.pipeline.run(&thread, &mut rng()).unwrap_err();

    assert!(err.is_fatal_narration());
    assert!(h.record.borrow().ledger.is_empty());
    assert!(h.record.borrow().composed.is_empty());
}

#[test]
fn run_writes_sidecar_ledger_and_composes() {
    let h = harness(|_, _| {});
    let thread = thread(vec![Comment::new("c1", "hello")]);

    let result = h.pipeline.run(&thread, &mut rng()).unwrap();

    assert!(result.compiled);
    assert!(!result.published);
    assert!(result.output.file.ends_with("videos/abc123/final.mp4"));

    let sidecar = threadreel::output::read_sidecar(&result.output.sidecar).unwrap();
    assert_eq!(sidecar, result.metadata);
    assert_eq!(sidecar.title, "Hello World");
    assert_eq!(sidecar.width, "1920");
    assert_eq!(sidecar.description, " #shorts");

    let record = h.record.borrow();
    assert_eq!(record.composed, vec![result.output.file.clone()]);
    assert_eq!(record.ledger.len(), 1);
    assert!(record.ledger[0].compiled);
    assert!(!record.ledger[0].uploaded);
}

#[test]
fn upload_happens_once() {
    let h = harness(|settings, _| settings.features.upload = true);
    let thread = thread(vec![Comment::new("c1", "hello")]);

    let first = h.pipeline.run(&thread, &mut rng()).unwrap();
    let second = h.pipeline.run(&thread, &mut rng()).unwrap();

    assert!(first.published);
    assert!(!second.published);
    assert_eq!(h.record.borrow().published, 1);
}

#[test]
fn failed_upload_is_not_fatal() {
    let h = harness_with(
        |settings, _| settings.features.upload = true,
        Faults {
            publish: true,
            ..Faults::default()
        },
    );
    let thread = thread(vec![Comment::new("c1", "hello")]);

    let result = h.pipeline.run(&thread, &mut rng()).unwrap();

    assert!(result.compiled);
    assert!(!result.published);
    assert!(!h.record.borrow().ledger[0].uploaded);
}

#[test]
fn no_compile_skips_render_and_upload() {
    let h = harness(|settings, _| {
        settings.features.compilation = false;
        settings.features.upload = true;
    });
    let thread = thread(vec![Comment::new("c1", "hello")]);

    let result = h.pipeline.run(&thread, &mut rng()).unwrap();

    assert!(!result.compiled);
    assert!(!result.published);
    assert!(h.record.borrow().composed.is_empty());
    assert!(!h.record.borrow().ledger[0].compiled);
}

#[test]
fn finalize_is_idempotent() {
    let h = harness(|_, _| {});
    let thread = thread(vec![Comment::new("c1", "hello")]);
    let result = h.pipeline.run(&thread, &mut rng()).unwrap();

    let presentation = threadreel::Presentation {
        description: result.output.description.clone(),
        thumbnail: None,
        video_dir: result.output.file.parent().unwrap().to_path_buf(),
    };
    let once = RunOutput::finalize(&result.timeline, &thread, &presentation);
    let twice = RunOutput::finalize(&result.timeline, &thread, &presentation);

    assert_eq!(once, twice);
    assert_eq!(once.metadata(), twice.metadata());
    assert_eq!(once, result.output);
}

#[test]
fn background_layer_covers_timeline() {
    let h = harness(|_, dir| {
        let backgrounds = dir.join("backgrounds");
        std::fs::create_dir_all(&backgrounds).unwrap();
        std::fs::write(backgrounds.join("forest.mp4"), b"video").unwrap();
    });
    let comments = (0..4)
        .map(|i| Comment::new(format!("c{i}"), "another one"))
        .collect();

    let timeline = h.pipeline.plan(&thread(comments), &mut rng()).unwrap();

    // 30s of narration over a 5s background: six loops, cut to the timeline
    assert_eq!(
        timeline.background.fit,
        threadreel::LayerFit::Loop { loops: 6 }
    );
    assert!((timeline.background.end() - timeline.duration).abs() < 1e-9);
}

#[test]
fn closed_timeline_skips_transition_and_comments() {
    let h = harness(|settings, dir| {
        settings.video.max_video_length = 12.0;
        std::fs::write(dir.join("static.mp4"), b"clip").unwrap();
    });
    let mut thread = thread(vec![Comment::new("c1", "Agreed"), Comment::new("c2", "Same")]);
    thread.body = Some("Line one\nLine two\nLine three".to_string());

    let result = h.pipeline.run(&thread, &mut rng()).unwrap();
    let kinds: Vec<SegmentKind> = result.timeline.segments.iter().map(|s| s.kind).collect();

    assert_eq!(kinds, vec![SegmentKind::Title, SegmentKind::BodyText]);
    assert!((result.timeline.duration - 12.0).abs() < 1e-9);
    // "Line two" is what closed the timeline; nothing is narrated after it
    assert_eq!(
        h.record.borrow().narrated,
        vec!["Hello World", "Line one", "Line two"]
    );
}

#[test]
fn empty_narration_is_skipped() {
    let h = harness(|settings, _| settings.video.pause = 0.0);
    let thread = thread(vec![
        Comment::new("silent", "..."),
        Comment::new("c2", "Something worth hearing"),
    ]);

    let result = h.pipeline.run(&thread, &mut rng()).unwrap();
    let units: Vec<Option<&str>> = result
        .timeline
        .segments
        .iter()
        .map(|s| s.unit.as_deref())
        .collect();

    assert_eq!(units, vec![None, Some("c2")]);
    assert!(result.timeline.segments.iter().all(|s| s.duration > 0.0));
    assert!((result.timeline.duration - 10.0).abs() < 1e-9);
}

#[test]
fn tall_body_is_reflowed_and_overflowing_lines_dropped() {
    // 200px frame: two 72px caption rows fit, three do not
    let h = harness(|settings, _| settings.video.height = 200);
    let overflow = "overflow ".repeat(20);
    let mut thread = thread(Vec::new());
    thread.body = Some(format!(
        "Line one\nLine two\nLine three\n{}\nLine five",
        overflow.trim_end()
    ));

    let result = h.pipeline.run(&thread, &mut rng()).unwrap();

    assert_eq!(
        captions(&result.timeline, SegmentKind::BodyText),
        vec!["Line one", "Line one\nLine two", "Line three", "Line five"]
    );
    // title plus four body lines; the dropped line takes no time
    assert!((result.timeline.duration - 30.0).abs() < 1e-9);
    assert!(!h
        .record
        .borrow()
        .narrated
        .iter()
        .any(|t| t.starts_with("overflow")));
}

#[test]
fn tall_comment_is_split_into_reflowed_lines() {
    let h = harness(|settings, _| settings.video.height = 200);
    let thread = thread(vec![
        Comment::new("c1", "First point\nSecond point\nThird point"),
        Comment::new("c2", "Short one"),
    ]);

    let result = h.pipeline.run(&thread, &mut rng()).unwrap();
    let timeline = &result.timeline;

    assert_eq!(
        captions(timeline, SegmentKind::CommentText),
        vec![
            "First point",
            "First point\nSecond point",
            "Third point",
            "Short one"
        ]
    );
    let units: Vec<Option<&str>> = timeline.segments.iter().map(|s| s.unit.as_deref()).collect();
    assert_eq!(
        units,
        vec![None, Some("c1"), Some("c1"), Some("c1"), Some("c2")]
    );
    assert!((timeline.duration - 30.0).abs() < 1e-9);
}
