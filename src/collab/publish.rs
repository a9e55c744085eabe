//! Publishing through an external upload program
//!
//! The program gets the [`VideoMetadata`] sidecar as JSON on stdin and the
//! configured arguments on its command line. It is only considered ready
//! when every credential file exists.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use super::Publisher;
use crate::config::PublishSettings;
use crate::error::{ReelError, Result};
use crate::output::{RunOutput, VideoMetadata};

/// [`Publisher`] that runs an upload program
#[derive(Debug, Clone)]
pub struct CommandPublisher {
    program: Option<PathBuf>,
    args: Vec<String>,
    credential_files: Vec<PathBuf>,
}

impl CommandPublisher {
    #[must_use]
    pub fn new(program: Option<PathBuf>, args: Vec<String>, credential_files: Vec<PathBuf>) -> Self {
        Self {
            program,
            args,
            credential_files,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &PublishSettings) -> Self {
        Self::new(
            settings.command.clone(),
            settings.args.clone(),
            settings.credential_files.clone(),
        )
    }
}

impl Publisher for CommandPublisher {
    fn is_ready(&self) -> bool {
        if self.program.is_none() {
            debug!("no publish command configured");
            return false;
        }

        let missing: Vec<_> = self
            .credential_files
            .iter()
            .filter(|p| !p.exists())
            .collect();
        if !missing.is_empty() {
            info!(?missing, "skipping upload, credential files missing");
            return false;
        }
        true
    }

    fn publish(&self, output: &RunOutput, metadata: &VideoMetadata) -> Result<()> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| ReelError::Config("no publish command configured".into()))?;

        let input = serde_json::to_string(metadata)?;
        info!(file = %output.file.display(), "publishing video");

        let mut child = Command::new(program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ReelError::MissingDependency(format!(
                    "failed to spawn publish program {}: {e}",
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
                "publish program exited with {}: {}",
                result.status,
                stderr.trim()
            ))));
        }

        let stdout = String::from_utf8_lossy(&result.stdout);
        if !stdout.trim().is_empty() {
            info!(response = %stdout.trim(), "publish program finished");
        }
        Ok(())
    }
}
