// src/runner.rs
//! Chunk runner: read a chunk, process it, write survivors, commit, repeat
//!
//! The runner is the only place that decides between skipping and aborting.
//! Chunk N is written and committed before chunk N+1 is read, so the source
//! cursor only ever moves forward and always sits on a chunk boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, info_span, trace};

use crate::consts::{DEFAULT_CHUNK_SIZE, DEFAULT_JOB_NAME, DEFAULT_STEP_NAME};
use crate::enums::FailureStage;
use crate::error::{CoreError, ErrorKind, ProcessFailure};
use crate::key_service::KeyService;
use crate::model::{Chunk, DecryptedRecord, EncryptedRecord, SkipRecord};
use crate::sink::RecordSink;
use crate::skip::{SkipBudget, SkipPolicy};
use crate::source::RecordSource;
use crate::stages::CompositeProcessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Filling,
    Processing,
    Writing,
    Committing,
    /// Source exhausted mid-chunk; that final partial chunk has been committed
    Draining,
    Done,
    /// Stop requested and honoured at a chunk boundary
    Stopped,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Stopped | RunState::Aborted)
    }

    /// Process exit status for a terminal state; non-terminal states count as failures
    pub fn exit_code(&self) -> i32 {
        match self {
            RunState::Done => 0,
            RunState::Stopped => 2,
            _ => 1,
        }
    }
}

/// Cooperative cancellation, checked before each chunk is read
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters and skip log for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub job_name: String,
    pub step_name: String,
    pub state: RunState,
    pub records_read: u64,
    /// Records that made it through key resolution and decryption
    pub records_processed: u64,
    pub records_written: u64,
    pub records_skipped: u64,
    pub chunks_committed: u64,
    pub last_committed_position: u64,
    pub skips: Vec<SkipRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    fn new(job_name: &str, step_name: &str, position: u64) -> Self {
        Self {
            job_name: job_name.to_string(),
            step_name: step_name.to_string(),
            state: RunState::Idle,
            records_read: 0,
            records_processed: 0,
            records_written: 0,
            records_skipped: 0,
            chunks_committed: 0,
            last_committed_position: position,
            skips: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.state.exit_code()
    }
}

/// Terminal `Aborted` state: the fatal error plus what was done before it
#[derive(Error, Debug)]
#[error("job {} aborted: {error}", .report.job_name)]
pub struct JobAborted {
    #[source]
    pub error: CoreError,
    pub report: RunReport,
}

impl JobAborted {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

pub struct ChunkRunner<S, K, T> {
    source: S,
    processor: CompositeProcessor<K>,
    sink: T,
    chunk_size: usize,
    policy: SkipPolicy,
    stop: StopHandle,
    state: RunState,
    history: Vec<RunState>,
    report: RunReport,
}

impl<S, K, T> ChunkRunner<S, K, T> {
    pub fn builder() -> ChunkRunnerBuilder<S, K, T> {
        ChunkRunnerBuilder::default()
    }
}

impl<S, K, T> ChunkRunner<S, K, T>
where
    S: RecordSource,
    K: KeyService,
    T: RecordSink,
{
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`
    pub fn state_history(&self) -> &[RunState] {
        &self.history
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &T {
        &self.sink
    }

    pub fn into_parts(self) -> (S, T) {
        (self.source, self.sink)
    }

    /// Drive the job to a terminal state
    ///
    /// `Ok` carries a report in `Done` or `Stopped`; `Err` is the aborted run.
    pub fn run(&mut self) -> Result<RunReport, JobAborted> {
        if self.state != RunState::Idle {
            return Err(self.abort(CoreError::ContractViolation(format!(
                "runner already ran to {:?}",
                self.state
            ))));
        }

        info!(
            job = %self.report.job_name,
            step = %self.report.step_name,
            chunk_size = self.chunk_size,
            skip_budget = %self.policy.budget(),
            position = self.report.last_committed_position,
            "job started"
        );

        match self.run_chunks() {
            Ok(terminal) => {
                self.transition(terminal);
                let report = self.finish();
                info!(
                    job = %report.job_name,
                    state = ?report.state,
                    read = report.records_read,
                    written = report.records_written,
                    skipped = report.records_skipped,
                    chunks = report.chunks_committed,
                    "job finished"
                );
                Ok(report)
            }
            Err(error) => Err(self.abort(error)),
        }
    }

    fn run_chunks(&mut self) -> Result<RunState, CoreError> {
        let mut chunk_index = 0u64;
        loop {
            if self.stop.is_stop_requested() {
                info!(job = %self.report.job_name, chunk = chunk_index, "stop requested");
                return Ok(RunState::Stopped);
            }

            let span = info_span!("chunk", job = %self.report.job_name, chunk = chunk_index);
            let _guard = span.enter();

            self.transition(RunState::Filling);
            let (chunk, exhausted) = self.fill(chunk_index)?;
            if chunk.is_empty() {
                return Ok(RunState::Done);
            }

            self.run_chunk(chunk)?;

            if exhausted {
                self.transition(RunState::Draining);
                return Ok(RunState::Done);
            }
            chunk_index += 1;
        }
    }

    fn fill(&mut self, chunk_index: u64) -> Result<(Chunk<EncryptedRecord>, bool), CoreError> {
        let mut chunk = Chunk::new(chunk_index, self.chunk_size);
        while !chunk.is_full() {
            let Some(record) = self.source.next()? else {
                debug!(records = chunk.len(), "source exhausted");
                return Ok((chunk, true));
            };
            self.report.records_read += 1;
            if let Err(record) = chunk.push(record) {
                return Err(CoreError::ContractViolation(format!(
                    "chunk {chunk_index} overflowed at record {}",
                    record.id
                )));
            }
        }
        Ok((chunk, false))
    }

    fn run_chunk(&mut self, chunk: Chunk<EncryptedRecord>) -> Result<(), CoreError> {
        let chunk_index = chunk.index();
        let records = chunk.len();
        let Some(last_position) = chunk.items().last().map(|r| r.position) else {
            return Ok(());
        };

        self.transition(RunState::Processing);
        let survivors = self.process(chunk_index, chunk.into_items())?;

        if !survivors.is_empty() {
            self.transition(RunState::Writing);
            self.write(chunk_index, &survivors)?;
        }

        self.transition(RunState::Committing);
        let position = last_position + 1;
        self.source.commit(position)?;
        self.report.chunks_committed += 1;
        self.report.last_committed_position = position;
        info!(records, survivors = survivors.len(), position, "chunk committed");
        Ok(())
    }

    fn process(
        &mut self,
        chunk_index: u64,
        records: Vec<EncryptedRecord>,
    ) -> Result<Vec<DecryptedRecord>, CoreError> {
        let mut survivors = Vec::with_capacity(records.len());
        for record in records {
            match self.processor.process(record) {
                Ok(decrypted) => {
                    self.report.records_processed += 1;
                    survivors.push(decrypted);
                }
                Err(ProcessFailure {
                    record_id,
                    stage,
                    error,
                }) => {
                    if error.kind() == ErrorKind::ContractViolation {
                        return Err(error);
                    }
                    trace!(record_id = %record_id, stage = %stage, "processing failed");
                    self.policy.try_skip(error, stage, [record_id], chunk_index)?;
                }
            }
        }
        Ok(survivors)
    }

    fn write(&mut self, chunk_index: u64, batch: &[DecryptedRecord]) -> Result<(), CoreError> {
        match self.sink.write_batch(batch) {
            Ok(()) => {
                self.report.records_written += batch.len() as u64;
                Ok(())
            }
            Err(source) => {
                let error = CoreError::SinkWrite {
                    batch_len: batch.len(),
                    source,
                };
                self.policy.try_skip(
                    error,
                    FailureStage::Write,
                    batch.iter().map(|r| r.id.clone()),
                    chunk_index,
                )
            }
        }
    }

    fn transition(&mut self, next: RunState) {
        trace!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
        self.history.push(next);
    }

    fn finish(&mut self) -> RunReport {
        self.report.state = self.state;
        self.report.skips = self.policy.skips().to_vec();
        self.report.records_skipped = self.report.skips.len() as u64;
        self.report.finished_at = Some(Utc::now());
        self.report.clone()
    }

    fn abort(&mut self, error: CoreError) -> JobAborted {
        error!(
            job = %self.report.job_name,
            kind = %error.kind(),
            during = ?self.state,
            "job aborted: {error}"
        );
        self.transition(RunState::Aborted);
        JobAborted {
            error,
            report: self.finish(),
        }
    }
}

/// Assembles a [`ChunkRunner`] from its injected capabilities
pub struct ChunkRunnerBuilder<S, K, T> {
    source: Option<S>,
    key_service: Option<K>,
    sink: Option<T>,
    chunk_size: usize,
    skip_budget: SkipBudget,
    job_name: String,
    step_name: String,
    stop: StopHandle,
}

impl<S, K, T> Default for ChunkRunnerBuilder<S, K, T> {
    fn default() -> Self {
        Self {
            source: None,
            key_service: None,
            sink: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            skip_budget: SkipBudget::default(),
            job_name: DEFAULT_JOB_NAME.to_string(),
            step_name: DEFAULT_STEP_NAME.to_string(),
            stop: StopHandle::default(),
        }
    }
}

impl<S, K, T> ChunkRunnerBuilder<S, K, T>
where
    S: RecordSource,
    K: KeyService,
    T: RecordSink,
{
    pub fn source(mut self, source: S) -> Self {
        self.source = Some(source);
        self
    }

    pub fn key_service(mut self, key_service: K) -> Self {
        self.key_service = Some(key_service);
        self
    }

    pub fn sink(mut self, sink: T) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn skip_budget(mut self, skip_budget: SkipBudget) -> Self {
        self.skip_budget = skip_budget;
        self
    }

    pub fn job_name(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = job_name.into();
        self
    }

    pub fn step_name(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = step_name.into();
        self
    }

    pub fn stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn build(self) -> Result<ChunkRunner<S, K, T>, CoreError> {
        let missing = |what: &str| CoreError::Config(format!("chunk runner needs a {what}"));
        let source = self.source.ok_or_else(|| missing("record source"))?;
        let key_service = self.key_service.ok_or_else(|| missing("key service"))?;
        let sink = self.sink.ok_or_else(|| missing("record sink"))?;

        if self.chunk_size == 0 {
            return Err(CoreError::Config("chunk size must be at least 1".into()));
        }
        if self.job_name.trim().is_empty() || self.step_name.trim().is_empty() {
            return Err(CoreError::Config("job and step names must not be empty".into()));
        }

        let report = RunReport::new(&self.job_name, &self.step_name, source.committed_position());
        Ok(ChunkRunner {
            source,
            processor: CompositeProcessor::new(key_service),
            sink,
            chunk_size: self.chunk_size,
            policy: SkipPolicy::new(self.skip_budget),
            stop: self.stop,
            state: RunState::Idle,
            history: vec![RunState::Idle],
            report,
        })
    }
}
