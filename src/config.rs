use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::writer::QuoteStyle;

/// What happens when a single record fails to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the run at the first failed record
    #[default]
    #[value(name = "abort")]
    #[serde(alias = "abort")]
    AbortOnError,
    /// Record the failure in the table report and keep going
    #[value(name = "skip")]
    #[serde(alias = "skip")]
    SkipAndContinue,
}

/// Which write strategy the engine is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WriterKind {
    /// Parameterized INSERT per record
    #[default]
    Raw,
    /// Entity mapping with key preservation
    Orm,
}

/// Seeding configuration, loadable from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeederConfig {
    pub writer: WriterKind,
    pub error_policy: ErrorPolicy,
    pub quote: QuoteStyle,
    /// Wrap each table's writes in one transaction
    pub transaction_per_table: bool,
    /// Only seed these tables
    pub include: Option<Vec<String>>,
    /// Seed everything except these tables
    pub exclude: Option<Vec<String>>,
}

impl SeederConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse config: {:?}", path))
    }
}
