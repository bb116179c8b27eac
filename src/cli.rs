use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ErrorPolicy, SeederConfig, WriterKind};
use crate::writer::QuoteStyle;

#[derive(Parser, Debug)]
#[command(name = "seedbridge")]
#[command(version, about = "Seed a database from JSONL datasets in foreign-key order")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load JSONL files into an existing SQLite database
    Seed {
        /// SQLite database path
        db: PathBuf,

        /// Directory containing <table>.jsonl files
        input_dir: PathBuf,

        #[command(flatten)]
        options: SeedOptions,
    },

    /// Print the order in which tables would be seeded
    Order {
        /// SQLite database path
        db: PathBuf,

        #[command(flatten)]
        filters: TableFilters,
    },

    /// List the datasets found in a directory
    ListTables {
        /// Directory containing <table>.jsonl files
        input_dir: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
pub struct TableFilters {
    /// Only include these tables (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub include: Option<Vec<String>>,

    /// Exclude these tables (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,
}

#[derive(Args, Debug, Default)]
pub struct SeedOptions {
    /// JSON config file; flags given on the command line take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write strategy
    #[arg(short, long, value_enum)]
    pub writer: Option<WriterKind>,

    /// What to do when a record fails to insert
    #[arg(long, value_enum)]
    pub on_error: Option<ErrorPolicy>,

    /// Identifier quoting style
    #[arg(short, long, value_enum)]
    pub quote: Option<QuoteStyle>,

    /// Wrap each table in its own transaction
    #[arg(short, long, overrides_with = "no_transaction_per_table")]
    pub transaction_per_table: bool,

    /// Write each record on its own, even if the config file asks for per-table transactions
    #[arg(long, overrides_with = "transaction_per_table")]
    pub no_transaction_per_table: bool,

    #[command(flatten)]
    pub filters: TableFilters,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

impl TableFilters {
    pub fn apply(self, config: &mut SeederConfig) {
        if self.include.is_some() {
            config.include = self.include;
        }
        if self.exclude.is_some() {
            config.exclude = self.exclude;
        }
    }
}

impl SeedOptions {
    /// Merge flags over an optional base config
    pub fn into_config(self, base: SeederConfig) -> SeederConfig {
        let mut config = base;
        if let Some(writer) = self.writer {
            config.writer = writer;
        }
        if let Some(policy) = self.on_error {
            config.error_policy = policy;
        }
        if let Some(quote) = self.quote {
            config.quote = quote;
        }
        if self.transaction_per_table {
            config.transaction_per_table = true;
        } else if self.no_transaction_per_table {
            config.transaction_per_table = false;
        }
        self.filters.apply(&mut config);
        config
    }
}
