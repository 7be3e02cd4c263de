// src/sink.rs
//! Record sinks: where decrypted payloads go
//!
//! [`RecordSink::write_batch`] is all-or-nothing from the runner's point of
//! view. A returned error means the batch was not delivered.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::consts::{MANIFEST_FILE_NAME, OUTPUT_FILE_EXTENSION, OUTPUT_ID_LENGTH_HEX};
use crate::error::SinkError;
use crate::model::DecryptedRecord;
use crate::util::{blake3_hex, output_id};

pub trait RecordSink {
    fn write_batch(&mut self, batch: &[DecryptedRecord]) -> Result<(), SinkError>;
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn write_batch(&mut self, batch: &[DecryptedRecord]) -> Result<(), SinkError> {
        (**self).write_batch(batch)
    }
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn write_batch(&mut self, batch: &[DecryptedRecord]) -> Result<(), SinkError> {
        (**self).write_batch(batch)
    }
}

/// One line of `manifest.jsonl`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub record_id: String,
    pub file: String,
    pub size_bytes: u64,
    pub blake3: String,
    pub written_at: DateTime<Utc>,
}

/// Writes each payload to its own file in an output directory
///
/// Files are named after a truncated BLAKE3 of the record id, so re-delivering
/// a record after a restart overwrites rather than duplicates it.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Creates `dir` if it does not exist yet
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, SinkError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE_NAME)
    }

    pub fn file_name_for(record_id: &str) -> String {
        format!(
            "{}.{}",
            output_id(record_id, OUTPUT_ID_LENGTH_HEX),
            OUTPUT_FILE_EXTENSION
        )
    }

    /// All manifest entries written so far, oldest first
    pub fn read_manifest(&self) -> Result<Vec<ManifestEntry>, SinkError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for line in BufReader::new(fs::File::open(path)?).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line)
                .map_err(|e| SinkError::Rejected(format!("unreadable manifest line: {e}")))?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// A payload moved into its final name, plus where the file it replaced was parked
struct Placed {
    target: PathBuf,
    backup: Option<PathBuf>,
}

impl DirectorySink {
    fn place(
        &self,
        tmp: tempfile::NamedTempFile,
        file: &str,
        index: usize,
    ) -> Result<Placed, SinkError> {
        let target = self.dir.join(file);
        let backup = if target.is_file() {
            let parked = self.dir.join(format!(".backup-{index}-{file}"));
            fs::rename(&target, &parked)?;
            Some(parked)
        } else {
            None
        };

        if let Err(e) = tmp.persist(&target) {
            if let Some(parked) = &backup {
                let _ = fs::rename(parked, &target);
            }
            return Err(SinkError::Io(e.error));
        }
        Ok(Placed { target, backup })
    }

    /// Newest first, so a record repeated within the batch unwinds in order
    fn roll_back(&self, placed: Vec<Placed>) {
        for done in placed.into_iter().rev() {
            let _ = fs::remove_file(&done.target);
            if let Some(parked) = done.backup {
                if let Err(e) = fs::rename(&parked, &done.target) {
                    warn!(file = %done.target.display(), "could not restore previous output: {e}");
                }
            }
        }
    }

    /// Appends all lines or truncates back to the previous length
    fn append_manifest(&self, lines: &str) -> Result<(), SinkError> {
        let mut manifest = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.manifest_path())?;
        let before = manifest.metadata()?.len();

        let written = manifest
            .write_all(lines.as_bytes())
            .and_then(|_| manifest.sync_all());
        if let Err(e) = written {
            let _ = manifest.set_len(before);
            return Err(e.into());
        }
        Ok(())
    }
}

impl RecordSink for DirectorySink {
    fn write_batch(&mut self, batch: &[DecryptedRecord]) -> Result<(), SinkError> {
        // Stage everything first; dropping a staged tempfile removes it.
        let mut staged = Vec::with_capacity(batch.len());
        for record in batch {
            let mut tmp = tempfile::Builder::new()
                .prefix(".staging-")
                .tempfile_in(&self.dir)?;
            tmp.write_all(record.payload())?;
            tmp.as_file().sync_all()?;
            staged.push((record, tmp));
        }

        let mut lines = String::new();
        let mut files = Vec::with_capacity(staged.len());
        for (record, _) in &staged {
            let entry = ManifestEntry {
                record_id: record.id.clone(),
                file: Self::file_name_for(&record.id),
                size_bytes: record.payload().len() as u64,
                blake3: blake3_hex(record.payload()),
                written_at: Utc::now(),
            };
            let line = serde_json::to_string(&entry)
                .map_err(|e| SinkError::Rejected(format!("manifest encoding failed: {e}")))?;
            lines.push_str(&line);
            lines.push('\n');
            files.push(entry.file);
        }

        // Files that existed before this batch are parked, not deleted, until the
        // manifest lines are durable.
        let mut placed = Vec::with_capacity(staged.len());
        for (index, ((_, tmp), file)) in staged.into_iter().zip(&files).enumerate() {
            match self.place(tmp, file, index) {
                Ok(done) => placed.push(done),
                Err(e) => {
                    self.roll_back(placed);
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.append_manifest(&lines) {
            self.roll_back(placed);
            return Err(e);
        }

        for done in placed {
            if let Some(parked) = done.backup {
                let _ = fs::remove_file(parked);
            }
        }

        debug!(dir = %self.dir.display(), records = files.len(), "batch written");
        Ok(())
    }
}
