use tracing::warn;

use super::SeedingEngine;
use crate::error::{SeedResult, SessionStateError};
use crate::parser::Record;
use crate::schema::DatasetInfo;
use crate::writer::RecordWriter;

/// Result of a single `write_record` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The record failed and the skip-and-continue policy recorded it
    Skipped,
}

/// A record that failed under the skip-and-continue policy
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    /// 0-based position of the record within its table session
    pub index: u64,
    pub message: String,
}

/// Outcome of seeding one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableReport {
    pub table: DatasetInfo,
    pub written: u64,
    pub skipped: Vec<SkippedRecord>,
}

/// Outcome of a whole seeding run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedSummary {
    pub tables: Vec<TableReport>,
}

impl SeedSummary {
    pub fn total_written(&self) -> u64 {
        self.tables.iter().map(|t| t.written).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.tables.iter().map(|t| t.skipped.len()).sum()
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table.name == name)
    }
}

/// State of the table currently being seeded
#[derive(Debug)]
pub(crate) struct ActiveSession {
    pub(crate) table: DatasetInfo,
    pub(crate) in_transaction: bool,
    pub(crate) next_index: u64,
    pub(crate) written: u64,
    pub(crate) skipped: Vec<SkippedRecord>,
}

impl ActiveSession {
    pub(crate) fn new(table: DatasetInfo, in_transaction: bool) -> Self {
        Self {
            table,
            in_transaction,
            next_index: 0,
            written: 0,
            skipped: Vec::new(),
        }
    }

    pub(crate) fn into_report(self) -> TableReport {
        TableReport {
            table: self.table,
            written: self.written,
            skipped: self.skipped,
        }
    }
}

/// Scoped seeding of one table
///
/// Dropping the session without calling [`finish`](Self::finish) aborts it:
/// any open transaction is rolled back and constraints are restored.
pub struct SeedingSession<'e, W: RecordWriter> {
    engine: &'e mut SeedingEngine<W>,
    finished: bool,
}

impl<'e, W: RecordWriter> SeedingSession<'e, W> {
    pub(crate) fn begin(engine: &'e mut SeedingEngine<W>, table: DatasetInfo) -> SeedResult<Self> {
        if let Some(active) = engine.current_table() {
            return Err(SessionStateError::AlreadySeeding {
                active: active.clone(),
                requested: table,
            }
            .into());
        }

        engine.start_seeding(table)?;
        Ok(Self {
            engine,
            finished: false,
        })
    }

    pub fn table(&self) -> Option<&DatasetInfo> {
        self.engine.current_table()
    }

    pub fn write(&mut self, record: &dyn Record) -> SeedResult<WriteOutcome> {
        self.engine.write_record(record)
    }

    /// Commit and restore constraints, returning the table report
    pub fn finish(mut self) -> SeedResult<TableReport> {
        self.finished = true;
        self.engine
            .finish_seeding()?
            .ok_or_else(|| SessionStateError::NotSeeding.into())
    }
}

impl<W: RecordWriter> Drop for SeedingSession<'_, W> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.engine.abort_seeding() {
            warn!(error = %err, "failed to restore database state after aborted session");
        }
    }
}
