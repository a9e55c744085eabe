//! Screenshot capture
//!
//! An optional capture program receives the [`CaptureRequest`] as JSON on
//! stdin and writes `title.png` and `comment_<id>.png` into the request's
//! output directory. Whatever files are present afterwards make up the
//! [`ScreenshotSet`]; a failing capture program only means fewer files.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use super::{CaptureRequest, ScreenshotSet, ScreenshotSource};
use crate::error::{ReelError, Result};

const TITLE_FILE: &str = "title.png";

/// File name of a comment screenshot
#[must_use]
pub fn comment_file_name(id: &str) -> String {
    format!("comment_{id}.png")
}

/// [`ScreenshotSource`] that runs a capture program, then scans the directory
#[derive(Debug, Clone, Default)]
pub struct ScreenshotCapture {
    program: Option<PathBuf>,
}

impl ScreenshotCapture {
    #[must_use]
    pub fn new(program: Option<PathBuf>) -> Self {
        Self { program }
    }

    fn run_program(&self, program: &Path, request: &CaptureRequest) -> Result<()> {
        let input = serde_json::to_string(request)?;
        debug!(program = %program.display(), comments = request.comment_ids.len(), "running capture");

        let mut child = Command::new(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ReelError::MissingDependency(format!(
                    "failed to spawn capture program {}: {e}",
                    program.display()
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }

        let result = child.wait_with_output()?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ReelError::Io(std::io::Error::other(format!(
                "capture program exited with {}: {}",
                result.status,
                stderr.trim()
            ))));
        }

        Ok(())
    }
}

/// Collect the expected screenshot files that exist in the output directory.
#[must_use]
pub fn scan(request: &CaptureRequest) -> ScreenshotSet {
    let mut set = ScreenshotSet::default();

    if request.include_title {
        let title = request.output_dir.join(TITLE_FILE);
        if title.is_file() {
            set.insert(ScreenshotSet::TITLE_KEY, title);
        }
    }

    for id in &request.comment_ids {
        let path = request.output_dir.join(comment_file_name(id));
        if path.is_file() {
            set.insert(id.clone(), path);
        } else {
            debug!(id, "no screenshot for comment");
        }
    }

    set
}

impl ScreenshotSource for ScreenshotCapture {
    fn capture(&self, request: &CaptureRequest) -> Result<ScreenshotSet> {
        std::fs::create_dir_all(&request.output_dir)?;

        if let Some(program) = &self.program {
            if let Err(e) = self.run_program(program, request) {
                warn!(error = %e, "screenshot capture failed, using existing files");
            }
        }

        let set = scan(request);
        info!(
            found = set.len(),
            dir = %request.output_dir.display(),
            "screenshots ready"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(dir: &Path) -> CaptureRequest {
        CaptureRequest {
            thread_id: "abc".to_string(),
            locator: "https://www.reddit.com/r/rust/comments/abc/".to_string(),
            output_dir: dir.to_path_buf(),
            include_title: true,
            comment_ids: vec!["c1".to_string(), "c2".to_string()],
        }
    }

    #[test]
    fn scans_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("title.png"), b"x").unwrap();
        std::fs::write(dir.path().join("comment_c2.png"), b"x").unwrap();

        let set = ScreenshotCapture::default()
            .capture(&request(dir.path()))
            .unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.title().is_some());
        assert!(set.get("c1").is_none());
        assert_eq!(set.get("c2"), Some(dir.path().join("comment_c2.png").as_path()));
    }

    #[test]
    fn failing_program_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("comment_c1.png"), b"x").unwrap();

        let capture = ScreenshotCapture::new(Some(PathBuf::from("/nonexistent/capture")));
        let set = capture.capture(&request(dir.path())).unwrap();

        assert_eq!(set.len(), 1);
    }

    #[test]
    fn title_skipped_when_not_requested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("title.png"), b"x").unwrap();

        let mut req = request(dir.path());
        req.include_title = false;
        assert!(scan(&req).title().is_none());
    }

    #[test]
    fn request_serializes_for_capture_program() {
        let json = serde_json::to_value(request(Path::new("/shots"))).unwrap();
        assert_eq!(json["thread_id"], "abc");
        assert_eq!(json["comment_ids"][1], "c2");
        assert_eq!(json["output_dir"], "/shots");
    }
}
