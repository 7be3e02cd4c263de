// src/source.rs
//! Record source: where encrypted records come from and where the cursor lives
//!
//! A source hands out records in order and remembers, durably, how far the
//! job has committed. Re-opening a source resumes at the last committed
//! position; records before it are never returned again.

use rusqlite::Connection;
use tracing::debug;

use crate::db::source_db_ops::{fetch_record_from, read_checkpoint, write_checkpoint};
use crate::error::{CoreError, Result};
use crate::model::EncryptedRecord;

pub trait RecordSource {
    /// Next record in source order, or `None` at end of stream
    fn next(&mut self) -> Result<Option<EncryptedRecord>>;

    /// Durably advance the read cursor to `position` (the next position to read)
    fn commit(&mut self, position: u64) -> Result<()>;

    /// Last committed position
    fn committed_position(&self) -> u64;
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn next(&mut self) -> Result<Option<EncryptedRecord>> {
        (**self).next()
    }

    fn commit(&mut self, position: u64) -> Result<()> {
        (**self).commit(position)
    }

    fn committed_position(&self) -> u64 {
        (**self).committed_position()
    }
}

/// Source reading `snapshot_records` with a cursor row per job step
pub struct SqliteRecordSource {
    conn: Connection,
    job_name: String,
    step_name: String,
    committed: u64,
    read_from: u64,
}

impl SqliteRecordSource {
    /// Opens at the last committed position of `job_name`/`step_name`
    pub fn new(
        conn: Connection,
        job_name: impl Into<String>,
        step_name: impl Into<String>,
    ) -> Result<Self> {
        let job_name = job_name.into();
        let step_name = step_name.into();
        let committed = read_checkpoint(&conn, &job_name, &step_name)?.unwrap_or(0);
        debug!(job = %job_name, step = %step_name, position = committed, "record source opened");

        Ok(Self {
            conn,
            job_name,
            step_name,
            committed,
            read_from: committed,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl RecordSource for SqliteRecordSource {
    fn next(&mut self) -> Result<Option<EncryptedRecord>> {
        let Some(row) = fetch_record_from(&self.conn, self.read_from)
            .map_err(|e| CoreError::Source(format!("read failed at {}: {e}", self.read_from)))?
        else {
            return Ok(None);
        };

        self.read_from = row.seq + 1;
        Ok(Some(row.into_record()))
    }

    fn commit(&mut self, position: u64) -> Result<()> {
        if position < self.committed {
            return Err(CoreError::ContractViolation(format!(
                "commit to {position} would move cursor back from {}",
                self.committed
            )));
        }
        write_checkpoint(&self.conn, &self.job_name, &self.step_name, position)
            .map_err(|e| CoreError::Source(format!("commit to {position} failed: {e}")))?;
        self.committed = position;
        if self.read_from < position {
            self.read_from = position;
        }
        Ok(())
    }

    fn committed_position(&self) -> u64 {
        self.committed
    }
}
