//! Narration through an external TTS command
//!
//! The command line is a template: `{output}` becomes the target audio path
//! and `{text}` the text to speak. Without a `{text}` placeholder the text is
//! written to the command's stdin instead, which is how piper-style engines
//! read their input.

use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use super::Narrator;
use crate::config::NarrationSettings;

const TEXT_PLACEHOLDER: &str = "{text}";
const OUTPUT_PLACEHOLDER: &str = "{output}";

/// [`Narrator`] that shells out to a TTS program
#[derive(Debug, Clone)]
pub struct CommandNarrator {
    program: String,
    args: Vec<String>,
}

impl CommandNarrator {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &NarrationSettings) -> Self {
        Self::new(settings.command.clone(), settings.args.clone())
    }

    fn reads_stdin(&self) -> bool {
        !self.args.iter().any(|a| a.contains(TEXT_PLACEHOLDER))
    }

    /// Arguments with placeholders filled in
    fn build_args(&self, text: &str, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(OUTPUT_PLACEHOLDER, &output)
                    .replace(TEXT_PLACEHOLDER, text)
            })
            .collect()
    }
}

impl Narrator for CommandNarrator {
    fn synthesize(&self, text: &str, output: &Path) -> io::Result<()> {
        if let Some(dir) = output.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let args = self.build_args(text, output);
        debug!(program = %self.program, ?args, "running tts");

        let stdin = if self.reads_stdin() {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut pipe) = child.stdin.take() {
            if let Err(e) = pipe.write_all(text.as_bytes()) {
                // Close stdin and reap the child before reporting
                drop(pipe);
                let status = child.wait();
                debug!(program = %self.program, ?status, "tts stopped reading its input");
                return Err(e);
            }
        }

        let result = child.wait_with_output()?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(io::Error::other(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} produced no file at {}", self.program, output.display()),
            ));
        }

        Ok(())
    }
}
