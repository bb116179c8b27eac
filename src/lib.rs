pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod parser;
pub mod reader;
pub mod schema;
pub mod source;
pub mod writer;

pub use cli::{Cli, Commands};
pub use config::{ErrorPolicy, SeederConfig, WriterKind};
pub use engine::{SeedSummary, SeedingEngine, SeedingSession, TableReport, WriteOutcome};
pub use error::{SchemaError, SeedError, SeedResult, SessionStateError, WriteError};
