// src/skip.rs
//! Skip policy: which failures may be dropped, and how many times
//!
//! The budget counts skip *decisions*, not records. A rejected sink batch
//! spends one unit but logs one [`SkipRecord`] per record in the batch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::enums::FailureStage;
use crate::error::{CoreError, ErrorKind};
use crate::model::SkipRecord;

/// Number of skip decisions allowed for a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawBudget", into = "RawBudget")]
pub enum SkipBudget {
    #[default]
    Unbounded,
    Limited(u64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawBudget {
    Limit(u64),
    Word(String),
}

impl TryFrom<RawBudget> for SkipBudget {
    type Error = String;

    fn try_from(raw: RawBudget) -> Result<Self, Self::Error> {
        match raw {
            RawBudget::Limit(n) => Ok(SkipBudget::Limited(n)),
            RawBudget::Word(word) => word.parse(),
        }
    }
}

impl From<SkipBudget> for RawBudget {
    fn from(budget: SkipBudget) -> Self {
        match budget {
            SkipBudget::Unbounded => RawBudget::Word("unbounded".into()),
            SkipBudget::Limited(n) => RawBudget::Limit(n),
        }
    }
}

impl FromStr for SkipBudget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(SkipBudget::Unbounded);
        }
        s.parse::<u64>()
            .map(SkipBudget::Limited)
            .map_err(|_| format!("skip budget must be a non-negative integer or \"unbounded\", got {s:?}"))
    }
}

impl fmt::Display for SkipBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipBudget::Unbounded => f.write_str("unbounded"),
            SkipBudget::Limited(n) => write!(f, "{n}"),
        }
    }
}

/// Owns the budget and the skip log for one run
#[derive(Debug)]
pub struct SkipPolicy {
    budget: SkipBudget,
    used: u64,
    skips: Vec<SkipRecord>,
}

impl SkipPolicy {
    pub fn new(budget: SkipBudget) -> Self {
        Self {
            budget,
            used: 0,
            skips: Vec::new(),
        }
    }

    /// Only key-resolution failures and rejected sink batches may be skipped
    pub fn is_skippable(kind: ErrorKind) -> bool {
        matches!(
            kind,
            ErrorKind::KeyDecryptionFailure | ErrorKind::SinkWriteFailure
        )
    }

    /// Spend one budget unit on `error`, logging a skip for each of `record_ids`
    ///
    /// On refusal the error is handed back unchanged and nothing is logged.
    pub fn try_skip<I>(
        &mut self,
        error: CoreError,
        stage: FailureStage,
        record_ids: I,
        chunk_index: u64,
    ) -> Result<(), CoreError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let kind = error.kind();
        if !Self::is_skippable(kind) || !self.has_budget() {
            return Err(error);
        }

        self.used += 1;
        for record_id in record_ids {
            let entry = SkipRecord::new(record_id, stage, &error, chunk_index);
            warn!(
                record_id = %entry.record_id,
                stage = %stage,
                kind = %kind,
                chunk = chunk_index,
                "record skipped: {}",
                entry.message
            );
            self.skips.push(entry);
        }
        Ok(())
    }

    fn has_budget(&self) -> bool {
        match self.budget {
            SkipBudget::Unbounded => true,
            SkipBudget::Limited(limit) => self.used < limit,
        }
    }

    pub fn budget(&self) -> SkipBudget {
        self.budget
    }

    /// Skip decisions taken so far
    pub fn used(&self) -> u64 {
        self.used
    }

    /// `None` when unbounded
    pub fn remaining(&self) -> Option<u64> {
        match self.budget {
            SkipBudget::Unbounded => None,
            SkipBudget::Limited(limit) => Some(limit.saturating_sub(self.used)),
        }
    }

    pub fn skips(&self) -> &[SkipRecord] {
        &self.skips
    }
}
