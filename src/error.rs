//! Error types for schema loading, session handling and record writes.

use thiserror::Error;

use crate::schema::TableId;

/// Problems with the schema metadata. Always fatal, raised before any write.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A table was requested or referenced but is not part of the metadata.
    #[error("table not found: {table}{}", format_referrer(.referenced_by))]
    TableNotFound {
        table: TableId,
        referenced_by: Option<TableId>,
    },

    #[error("table declared more than once: {0}")]
    DuplicateTable(TableId),

    /// Foreign keys loop back onto `table`; `chain` lists the loop in traversal order.
    #[error("foreign key cycle detected at {table}: {}", format_chain(.chain))]
    Cycle { table: TableId, chain: Vec<TableId> },

    #[error("failed to read schema metadata: {0}")]
    Metadata(#[from] rusqlite::Error),
}

fn format_referrer(referrer: &Option<TableId>) -> String {
    match referrer {
        Some(table) => format!(" (referenced by {})", table),
        None => String::new(),
    }
}

fn format_chain(chain: &[TableId]) -> String {
    chain
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Misuse of the start/write/finish protocol.
#[derive(Debug, Error, PartialEq)]
pub enum SessionStateError {
    #[error("no table is being seeded; call start_seeding first")]
    NotSeeding,

    #[error("already seeding {active}; finish it before starting {requested}")]
    AlreadySeeding { active: TableId, requested: TableId },
}

/// A single record failed to persist.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error("record has no fields")]
    EmptyRecord,

    #[error("no entity mapping registered for table {0}")]
    UnmappedTable(String),

    #[error("invalid value for column {column}: {message}")]
    InvalidValue { column: String, message: String },
}

/// Top-level error of a seeding run.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    SessionState(#[from] SessionStateError),

    #[error("failed to write record {index} into {table}: {source}")]
    Write {
        table: TableId,
        index: u64,
        #[source]
        source: WriteError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

/// Result type alias for seeding operations.
pub type SeedResult<T> = Result<T, SeedError>;
