//! The seeding engine: resolves table order and drives one session per table.

mod connection;
mod session;

pub use connection::*;
pub use session::{SeedSummary, SeedingSession, SkippedRecord, TableReport, WriteOutcome};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::config::{ErrorPolicy, SeederConfig};
use crate::error::{SchemaError, SeedError, SeedResult, SessionStateError};
use crate::filter::filter_tables;
use crate::parser::Record;
use crate::schema::{DatasetInfo, MetadataProvider, SchemaGraph, TableOrderResolver};
use crate::source::DatasetSource;
use crate::writer::{Backend, RecordWriter, SqliteBackend};
use session::ActiveSession;

/// Composition root for a seeding run
///
/// The writer strategy is fixed by the type parameter. Only one table can be
/// seeded at a time, since constraint suspension is table-scoped.
pub struct SeedingEngine<W: RecordWriter> {
    connector: Option<(Box<dyn ConnectionProvider>, String)>,
    connection: Option<Connection>,
    backend: Box<dyn Backend>,
    writer: W,
    graph: SchemaGraph,
    config: SeederConfig,
    active: Option<ActiveSession>,
}

impl<W: RecordWriter> SeedingEngine<W> {
    /// Build the engine, reading metadata once. Uses [`SqliteBackend`] with the configured quoting.
    pub fn new(
        metadata: &(impl MetadataProvider + ?Sized),
        writer: W,
        config: SeederConfig,
    ) -> SeedResult<Self> {
        let graph = SchemaGraph::build(metadata)?;
        debug!(tables = graph.tables().len(), "schema graph built");

        Ok(Self {
            connector: None,
            connection: None,
            backend: Box::new(SqliteBackend::new(config.quote)),
            writer,
            graph,
            config,
            active: None,
        })
    }

    /// Open the connection lazily through `provider` on first use
    pub fn connect_with(
        mut self,
        provider: impl ConnectionProvider + 'static,
        connection_string: impl Into<String>,
    ) -> Self {
        self.connector = Some((Box::new(provider), connection_string.into()));
        self
    }

    /// Use an already open connection
    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn with_backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    pub fn config(&self) -> &SeederConfig {
        &self.config
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// The live connection, opened on first call
    pub fn get_connection(&mut self) -> SeedResult<&Connection> {
        open_connection(&mut self.connection, self.connector.as_ref())
    }

    /// Tables to seed, principals before dependents, with include/exclude filters applied
    pub fn get_datasets(&self) -> SeedResult<Vec<DatasetInfo>> {
        let ordered = TableOrderResolver::new(&self.graph).resolve()?;
        filter_tables(
            ordered,
            self.config.include.as_deref(),
            self.config.exclude.as_deref(),
        )
    }

    pub fn current_table(&self) -> Option<&DatasetInfo> {
        self.active.as_ref().map(|a| &a.table)
    }

    /// Enter the seeding state for `table`, suspending constraints and auto-increment
    ///
    /// Starting the table that is already active is a no-op.
    pub fn start_seeding(&mut self, table: DatasetInfo) -> SeedResult<()> {
        if let Some(active) = &self.active {
            if active.table == table {
                return Ok(());
            }
            return Err(SessionStateError::AlreadySeeding {
                active: active.table.clone(),
                requested: table,
            }
            .into());
        }

        if !self.graph.contains(&table) {
            return Err(SchemaError::TableNotFound {
                table,
                referenced_by: None,
            }
            .into());
        }

        let conn = open_connection(&mut self.connection, self.connector.as_ref())?;
        let backend = self.backend.as_ref();

        backend.suspend_constraints(conn, &table)?;

        if let Err(err) = backend.suspend_auto_increment(conn, &table) {
            log_restore_failure(&table, backend.resume_constraints(conn, &table));
            return Err(err.into());
        }

        let in_transaction = self.config.transaction_per_table;
        if in_transaction {
            if let Err(err) = conn.execute_batch("BEGIN") {
                log_restore_failure(&table, restore_backend(conn, backend, &table));
                return Err(err.into());
            }
        }

        info!(table = %table, "seeding started");
        self.active = Some(ActiveSession::new(table, in_transaction));
        Ok(())
    }

    /// Write one record into the active table through the configured writer
    pub fn write_record(&mut self, record: &dyn Record) -> SeedResult<WriteOutcome> {
        let Some(active) = self.active.as_mut() else {
            return Err(SessionStateError::NotSeeding.into());
        };
        let conn = open_connection(&mut self.connection, self.connector.as_ref())?;

        let index = active.next_index;
        active.next_index += 1;

        match self
            .writer
            .write_record(conn, self.backend.as_ref(), &active.table, record)
        {
            Ok(()) => {
                active.written += 1;
                Ok(WriteOutcome::Written)
            }
            Err(source) => match self.config.error_policy {
                ErrorPolicy::AbortOnError => Err(SeedError::Write {
                    table: active.table.clone(),
                    index,
                    source,
                }),
                ErrorPolicy::SkipAndContinue => {
                    warn!(table = %active.table, index, error = %source, "record skipped");
                    active.skipped.push(SkippedRecord {
                        index,
                        message: source.to_string(),
                    });
                    Ok(WriteOutcome::Skipped)
                }
            },
        }
    }

    /// Leave the seeding state: commit, then restore auto-increment and constraints
    ///
    /// Returns `None` when no table was active.
    pub fn finish_seeding(&mut self) -> SeedResult<Option<TableReport>> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        let conn = open_connection(&mut self.connection, self.connector.as_ref())?;
        let backend = self.backend.as_ref();

        let committed = if active.in_transaction {
            conn.execute_batch("COMMIT").map_err(|err| {
                log_restore_failure(&active.table, conn.execute_batch("ROLLBACK"));
                SeedError::from(err)
            })
        } else {
            Ok(())
        };
        let restored = restore_backend(conn, backend, &active.table);

        committed?;
        restored?;

        let report = active.into_report();
        info!(
            table = %report.table,
            written = report.written,
            skipped = report.skipped.len(),
            "seeding finished"
        );
        Ok(Some(report))
    }

    /// Leave the seeding state after a failure: roll back, then restore
    pub fn abort_seeding(&mut self) -> SeedResult<()> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        let conn = open_connection(&mut self.connection, self.connector.as_ref())?;
        let backend = self.backend.as_ref();

        let rolled_back = if active.in_transaction {
            conn.execute_batch("ROLLBACK").map_err(SeedError::from)
        } else {
            Ok(())
        };
        let restored = restore_backend(conn, backend, &active.table);

        warn!(table = %active.table, written = active.written, "seeding aborted");

        rolled_back?;
        restored
    }

    /// Start a scoped session that is aborted on drop unless finished
    pub fn session(&mut self, table: DatasetInfo) -> SeedResult<SeedingSession<'_, W>> {
        SeedingSession::begin(self, table)
    }

    /// Seed every table that `source` has data for, in dependency order
    pub fn seed(&mut self, source: &dyn DatasetSource) -> SeedResult<SeedSummary> {
        let order = self.get_datasets()?;

        for table in source.datasets() {
            if !self.graph.contains(&table) {
                warn!(table = %table, "dataset has no matching table, ignored");
            }
        }

        let mut summary = SeedSummary::default();

        for table in order {
            if !source.has_dataset(&table) {
                debug!(table = %table, "no dataset, skipping");
                continue;
            }

            let mut session = self.session(table.clone())?;
            for record in source.records(&table)? {
                session.write(&record?)?;
            }
            summary.tables.push(session.finish()?);
        }

        info!(
            tables = summary.tables.len(),
            written = summary.total_written(),
            skipped = summary.total_skipped(),
            "seeding complete"
        );
        Ok(summary)
    }
}

fn open_connection<'a>(
    slot: &'a mut Option<Connection>,
    connector: Option<&(Box<dyn ConnectionProvider>, String)>,
) -> SeedResult<&'a Connection> {
    if slot.is_none() {
        let (provider, connection_string) = connector
            .ok_or_else(|| SeedError::Config("no connection or connection provider".into()))?;
        *slot = Some(provider.connect(connection_string)?);
    }
    slot.as_ref()
        .ok_or_else(|| SeedError::Config("connection unavailable".into()))
}

/// Resume auto-increment and constraints, attempting both before reporting
fn restore_backend(conn: &Connection, backend: &dyn Backend, table: &DatasetInfo) -> SeedResult<()> {
    let auto_increment = backend.resume_auto_increment(conn, table);
    let constraints = backend.resume_constraints(conn, table);
    auto_increment?;
    constraints?;
    Ok(())
}

fn log_restore_failure<E: std::fmt::Display>(table: &DatasetInfo, result: Result<(), E>) {
    if let Err(err) = result {
        warn!(table = %table, error = %err, "failed to restore database state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ErrorPolicy;
    use crate::parser::DataRecord;
    use crate::schema::{TableDescriptor, TableId};
    use crate::source::MemorySource;
    use crate::writer::RawSqlWriter;

    const SCHEMA: &str = "
        PRAGMA foreign_keys = ON;
        CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
        CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            customer_id INTEGER NOT NULL REFERENCES customers(id)
        );";

    fn tables() -> Vec<TableDescriptor> {
        vec![
            TableDescriptor::new(TableId::new("orders")).references(TableId::new("customers")),
            TableDescriptor::new(TableId::new("customers")),
        ]
    }

    fn engine(config: SeederConfig) -> SeedingEngine<RawSqlWriter> {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        SeedingEngine::new(&tables(), RawSqlWriter::new(), config)
            .unwrap()
            .with_connection(conn)
    }

    fn count(engine: &mut SeedingEngine<RawSqlWriter>, table: &str) -> i64 {
        engine
            .get_connection()
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    fn fk_enabled(engine: &mut SeedingEngine<RawSqlWriter>) -> bool {
        SqliteBackend::foreign_keys_enabled(engine.get_connection().unwrap()).unwrap()
    }

    #[test]
    fn test_get_datasets_orders_principals_first() {
        let engine = engine(SeederConfig::default());
        let names: Vec<_> = engine
            .get_datasets()
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["customers", "orders"]);
    }

    #[test]
    fn test_write_without_session_fails() {
        let mut engine = engine(SeederConfig::default());
        let record = DataRecord::new().with("id", 1i64).with("name", "Ann");

        assert!(matches!(
            engine.write_record(&record),
            Err(SeedError::SessionState(SessionStateError::NotSeeding))
        ));

        engine.start_seeding(TableId::new("customers")).unwrap();
        engine.finish_seeding().unwrap();
        assert!(matches!(
            engine.write_record(&record),
            Err(SeedError::SessionState(SessionStateError::NotSeeding))
        ));
        assert_eq!(count(&mut engine, "customers"), 0);
    }

    #[test]
    fn test_second_table_while_seeding_fails() {
        let mut engine = engine(SeederConfig::default());
        engine.start_seeding(TableId::new("customers")).unwrap();
        engine.start_seeding(TableId::new("customers")).unwrap();

        let err = engine.start_seeding(TableId::new("orders")).unwrap_err();
        assert!(matches!(
            err,
            SeedError::SessionState(SessionStateError::AlreadySeeding { .. })
        ));
        assert_eq!(engine.current_table(), Some(&TableId::new("customers")));
    }

    #[test]
    fn test_unknown_table_rejected() {
        let mut engine = engine(SeederConfig::default());
        assert!(matches!(
            engine.start_seeding(TableId::new("invoices")),
            Err(SeedError::Schema(SchemaError::TableNotFound { .. }))
        ));
        assert!(engine.current_table().is_none());
    }

    #[test]
    fn test_constraints_suspended_and_restored() {
        let mut engine = engine(SeederConfig::default());
        assert!(fk_enabled(&mut engine));

        engine.start_seeding(TableId::new("orders")).unwrap();
        assert!(!fk_enabled(&mut engine));
        // Dangling reference is accepted while constraints are suspended
        let record = DataRecord::new().with("id", 1i64).with("customer_id", 99i64);
        assert_eq!(engine.write_record(&record).unwrap(), WriteOutcome::Written);

        let report = engine.finish_seeding().unwrap().unwrap();
        assert_eq!(report.written, 1);
        assert!(fk_enabled(&mut engine));
    }

    #[test]
    fn test_finish_without_writes_and_when_idle() {
        let mut engine = engine(SeederConfig::default());
        assert_eq!(engine.finish_seeding().unwrap(), None);

        engine.start_seeding(TableId::new("customers")).unwrap();
        let report = engine.finish_seeding().unwrap().unwrap();
        assert_eq!(report.written, 0);
        assert!(report.skipped.is_empty());
        assert!(fk_enabled(&mut engine));
    }

    #[test]
    fn test_abort_policy_stops_with_write_error() {
        let mut engine = engine(SeederConfig::default());
        engine.start_seeding(TableId::new("customers")).unwrap();

        let bad = DataRecord::new().with("id", 1i64);
        match engine.write_record(&bad) {
            Err(SeedError::Write { table, index, .. }) => {
                assert_eq!(table, TableId::new("customers"));
                assert_eq!(index, 0);
            }
            other => panic!("expected write error, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_policy_reports_failures() {
        let mut engine = engine(SeederConfig {
            error_policy: ErrorPolicy::SkipAndContinue,
            ..SeederConfig::default()
        });
        engine.start_seeding(TableId::new("customers")).unwrap();

        let records = [
            DataRecord::new().with("id", 1i64).with("name", "Ann"),
            DataRecord::new().with("id", 2i64),
            DataRecord::new().with("id", 3i64).with("name", "Cy"),
        ];
        let outcomes: Vec<_> = records
            .iter()
            .map(|r| engine.write_record(r).unwrap())
            .collect();
        assert_eq!(
            outcomes,
            vec![
                WriteOutcome::Written,
                WriteOutcome::Skipped,
                WriteOutcome::Written
            ]
        );

        let report = engine.finish_seeding().unwrap().unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(count(&mut engine, "customers"), 2);
    }

    #[test]
    fn test_dropped_session_restores_constraints() {
        let mut engine = engine(SeederConfig::default());
        {
            let mut session = engine.session(TableId::new("customers")).unwrap();
            session
                .write(&DataRecord::new().with("id", 1i64).with("name", "Ann"))
                .unwrap();
            assert!(session.write(&DataRecord::new().with("id", 2i64)).is_err());
        }
        assert!(engine.current_table().is_none());
        assert!(fk_enabled(&mut engine));
        assert_eq!(count(&mut engine, "customers"), 1);
    }

    #[test]
    fn test_transaction_per_table_rolls_back_on_abort() {
        let mut engine = engine(SeederConfig {
            transaction_per_table: true,
            ..SeederConfig::default()
        });
        {
            let mut session = engine.session(TableId::new("customers")).unwrap();
            session
                .write(&DataRecord::new().with("id", 1i64).with("name", "Ann"))
                .unwrap();
        }
        assert_eq!(count(&mut engine, "customers"), 0);
        assert!(fk_enabled(&mut engine));

        let mut session = engine.session(TableId::new("customers")).unwrap();
        session
            .write(&DataRecord::new().with("id", 1i64).with("name", "Ann"))
            .unwrap();
        assert_eq!(session.finish().unwrap().written, 1);
        assert_eq!(count(&mut engine, "customers"), 1);
    }

    #[test]
    fn test_session_refuses_nested_start() {
        let mut engine = engine(SeederConfig::default());
        engine.start_seeding(TableId::new("customers")).unwrap();
        assert!(matches!(
            engine.session(TableId::new("customers")),
            Err(SeedError::SessionState(SessionStateError::AlreadySeeding { .. }))
        ));
        assert_eq!(engine.current_table(), Some(&TableId::new("customers")));
    }

    #[test]
    fn test_seed_from_memory_source() {
        let mut engine = engine(SeederConfig::default());
        // Dependents listed first; the engine still seeds customers before orders
        let source = MemorySource::new()
            .table(
                TableId::new("orders"),
                vec![DataRecord::new().with("id", 10i64).with("customer_id", 1i64)],
            )
            .table(
                TableId::new("customers"),
                vec![DataRecord::new().with("id", 1i64).with("name", "Ann")],
            );

        let summary = engine.seed(&source).unwrap();
        let seeded: Vec<_> = summary.tables.iter().map(|t| t.table.name.as_str()).collect();
        assert_eq!(seeded, vec!["customers", "orders"]);
        assert_eq!(summary.total_written(), 2);
    }

    #[test]
    fn test_lazy_connection_through_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lazy.db");
        let mut engine = SeedingEngine::new(&tables(), RawSqlWriter::new(), SeederConfig::default())
            .unwrap()
            .connect_with(SqliteConnector, path.to_string_lossy());

        assert!(!path.exists());
        engine.get_connection().unwrap().execute_batch(SCHEMA).unwrap();
        assert!(path.exists());
        assert_eq!(count(&mut engine, "customers"), 0);
    }

    #[test]
    fn test_missing_connection_is_config_error() {
        let mut engine =
            SeedingEngine::new(&tables(), RawSqlWriter::new(), SeederConfig::default()).unwrap();
        assert!(matches!(engine.get_connection(), Err(SeedError::Config(_))));
    }
}
