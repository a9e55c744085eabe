//! Run ledger stored as JSON lines
//!
//! One [`LedgerRow`] per line. Appends only add a line; marking a row
//! compiled or uploaded rewrites the file with every row for that id
//! updated.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::Ledger;
use crate::error::{ReelError, Result};
use crate::output::LedgerRow;

/// [`Ledger`] backed by a JSON lines file
#[derive(Debug, Clone)]
pub struct JsonLedger {
    path: PathBuf,
}

impl JsonLedger {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rows in file order. A missing file is an empty ledger.
    pub fn rows(&self) -> Result<Vec<LedgerRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| {
                    ReelError::Ledger(format!("{} line {}: {e}", self.path.display(), n + 1))
                })
            })
            .collect()
    }

    fn update(&self, id: &str, apply: impl Fn(&mut LedgerRow)) -> Result<()> {
        let mut rows = self.rows()?;
        let mut found = false;
        for row in rows.iter_mut().filter(|r| r.id == id) {
            apply(row);
            found = true;
        }
        if !found {
            return Err(ReelError::Ledger(format!("no ledger row for {id}")));
        }

        let mut out = String::new();
        for row in &rows {
            out.push_str(&serde_json::to_string(row)?);
            out.push('\n');
        }
        fs::write(&self.path, out)?;
        Ok(())
    }
}

impl Ledger for JsonLedger {
    fn append(&self, row: &LedgerRow) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(row)?)?;

        debug!(id = %row.id, ledger = %self.path.display(), "ledger row appended");
        Ok(())
    }

    fn is_uploaded(&self, id: &str) -> Result<bool> {
        Ok(self.rows()?.iter().any(|r| r.id == id && r.uploaded))
    }

    fn mark_uploaded(&self, id: &str) -> Result<()> {
        self.update(id, |row| row.uploaded = true)?;
        info!(id, "marked uploaded");
        Ok(())
    }

    fn mark_compiled(&self, id: &str) -> Result<()> {
        self.update(id, |row| row.compiled = true)?;
        debug!(id, "marked compiled");
        Ok(())
    }
}
