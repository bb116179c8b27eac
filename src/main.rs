use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use seedbridge::{
    cli::{Cli, Commands},
    engine::{ConnectionProvider, SeedSummary, SeedingEngine, SqliteConnector},
    schema::{MetadataProvider, SqliteMetadata, TableDescriptor},
    source::{DatasetSource, JsonlDirectory},
    writer::{EntityRegistry, OrmEntityWriter, RawSqlWriter, RecordWriter},
    SeederConfig, WriterKind,
};
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("seedbridge=info")),
        )
        .init();

    let cli = Cli::parse_args();

    match cli.command {
        Commands::Seed {
            db,
            input_dir,
            options,
        } => {
            let start = Instant::now();

            let base = match &options.config {
                Some(path) => SeederConfig::from_file(path)?,
                None => SeederConfig::default(),
            };
            let config = options.into_config(base);

            let source = JsonlDirectory::open(&input_dir)?;
            let (conn, tables) = open_database(&db)?;

            let summary = match config.writer {
                WriterKind::Raw => seed(RawSqlWriter::new(), &tables, conn, config, &source)?,
                WriterKind::Orm => {
                    let registry = EntityRegistry::from_tables(tables.iter().cloned());
                    seed(OrmEntityWriter::new(registry), &tables, conn, config, &source)?
                }
            };

            print_summary(&summary);
            println!(
                "\nSeeded {:?} ({} records, {} skipped) in {:.1}s",
                db,
                summary.total_written(),
                summary.total_skipped(),
                start.elapsed().as_secs_f64()
            );
        }

        Commands::Order { db, filters } => {
            let (conn, tables) = open_database(&db)?;
            let mut config = SeederConfig::default();
            filters.apply(&mut config);

            let engine =
                SeedingEngine::new(&tables, RawSqlWriter::new(), config)?.with_connection(conn);
            for (i, table) in engine.get_datasets()?.iter().enumerate() {
                println!("{:>3}. {}", i + 1, table);
            }
        }

        Commands::ListTables { input_dir } => {
            let source = JsonlDirectory::open(&input_dir)?;
            println!("Datasets in {:?}:\n", source.dir());
            for table in source.datasets() {
                println!("  {}", table);
            }
        }
    }

    Ok(())
}

/// Open an existing database and read its schema metadata
fn open_database(db: &Path) -> Result<(Connection, Vec<TableDescriptor>)> {
    if !db.exists() {
        bail!("Database not found: {:?}", db);
    }

    let conn = SqliteConnector
        .connect(&db.to_string_lossy())
        .with_context(|| format!("Failed to open database: {:?}", db))?;
    let tables = SqliteMetadata::new(&conn)
        .tables()
        .context("Failed to read schema metadata")?;

    Ok((conn, tables))
}

fn seed<W: RecordWriter>(
    writer: W,
    tables: &[TableDescriptor],
    conn: Connection,
    config: SeederConfig,
    source: &dyn DatasetSource,
) -> Result<SeedSummary> {
    let mut engine = SeedingEngine::new(tables, writer, config)?.with_connection(conn);
    Ok(engine.seed(source)?)
}

fn print_summary(summary: &SeedSummary) {
    for report in &summary.tables {
        println!("  {}: {} records", report.table, report.written);
        for skipped in &report.skipped {
            println!("    skipped record {}: {}", skipped.index, skipped.message);
        }
    }
}
