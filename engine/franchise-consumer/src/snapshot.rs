//! Append-only NDJSON snapshot of processed records

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use franchise_core::CanonicalRecord;
use tracing::debug;

use crate::error::SnapshotError;

/// Writes one CanonicalRecord per line, never truncating the file
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `records` and flush. Returns the number of lines written.
    pub fn append(&self, records: &[CanonicalRecord]) -> Result<usize, SnapshotError> {
        if records.is_empty() {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // Encode everything first so a bad record never leaves a half-written batch
        let lines = records.iter().map(CanonicalRecord::to_json).collect::<Result<Vec<_>, _>>()?;

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for line in &lines {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        debug!("Appended {} records to snapshot {:?}", lines.len(), self.path);
        Ok(lines.len())
    }
}
