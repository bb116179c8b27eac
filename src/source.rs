//! Dataset sources: where the records to seed come from.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::parser::{parse_record, DataRecord};
use crate::schema::DatasetInfo;

/// Stream of records for one table
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<DataRecord>> + 'a>;

/// Supplies the tables to seed and, per table, a sequence of records
pub trait DatasetSource {
    /// Tables this source has data for
    fn datasets(&self) -> Vec<DatasetInfo>;

    fn has_dataset(&self, table: &DatasetInfo) -> bool {
        self.datasets().contains(table)
    }

    fn records(&self, table: &DatasetInfo) -> Result<RecordStream<'_>>;
}

/// Directory of `<table>.jsonl` (or `<schema>.<table>.jsonl`) files, one JSON object per line
pub struct JsonlDirectory {
    dir: PathBuf,
    files: HashMap<DatasetInfo, PathBuf>,
}

impl JsonlDirectory {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut files = HashMap::new();

        let entries =
            fs::read_dir(&dir).with_context(|| format!("Failed to read directory: {:?}", dir))?;

        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let table = match stem.split_once('.') {
                Some((schema, name)) => DatasetInfo::with_schema(schema, name),
                None => DatasetInfo::new(stem),
            };
            files.insert(table, path);
        }

        Ok(Self { dir, files })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve the file for a table; a schema-qualified file wins over a bare one
    fn file_for(&self, table: &DatasetInfo) -> Option<&PathBuf> {
        self.files
            .get(table)
            .or_else(|| self.files.get(&DatasetInfo::new(table.name.clone())))
    }
}

impl DatasetSource for JsonlDirectory {
    fn datasets(&self) -> Vec<DatasetInfo> {
        let mut tables: Vec<_> = self.files.keys().cloned().collect();
        tables.sort();
        tables
    }

    fn has_dataset(&self, table: &DatasetInfo) -> bool {
        self.file_for(table).is_some()
    }

    fn records(&self, table: &DatasetInfo) -> Result<RecordStream<'_>> {
        let Some(path) = self.file_for(table) else {
            return Ok(Box::new(std::iter::empty()));
        };

        let file = File::open(path).with_context(|| format!("Failed to open: {:?}", path))?;
        let reader = BufReader::new(file);
        let path = path.clone();

        let records = reader
            .lines()
            .enumerate()
            .filter(|(_, line)| !matches!(line, Ok(l) if l.trim().is_empty()))
            .map(move |(line_no, line)| {
                let line = line.context("Failed to read line")?;
                parse_record(&line)
                    .with_context(|| format!("Failed to parse record at {:?}:{}", path, line_no + 1))
            });

        Ok(Box::new(records))
    }
}

/// Records held in memory, keyed by table
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: Vec<(DatasetInfo, Vec<DataRecord>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: DatasetInfo, records: Vec<DataRecord>) -> Self {
        self.tables.push((table, records));
        self
    }
}

impl DatasetSource for MemorySource {
    fn datasets(&self) -> Vec<DatasetInfo> {
        self.tables.iter().map(|(t, _)| t.clone()).collect()
    }

    fn records(&self, table: &DatasetInfo) -> Result<RecordStream<'_>> {
        let table = table.clone();
        let records = self
            .tables
            .iter()
            .filter(move |(t, _)| *t == table)
            .flat_map(|(_, records)| records.iter().cloned().map(Ok));
        Ok(Box::new(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Record, SqlValue};

    #[test]
    fn test_jsonl_directory_reads_records() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("customers.jsonl"),
            "{\"id\": 1, \"name\": \"Ann\"}\n\n{\"id\": 2, \"name\": \"Bob\"}\n",
        )
        .unwrap();
        fs::write(dir.path().join("sales.orders.jsonl"), "{\"id\": 10}\n").unwrap();
        fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let source = JsonlDirectory::open(dir.path()).unwrap();
        assert_eq!(
            source.datasets(),
            vec![
                DatasetInfo::new("customers"),
                DatasetInfo::with_schema("sales", "orders"),
            ]
        );

        let records: Vec<_> = source
            .records(&DatasetInfo::new("customers"))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("name"), Some(&SqlValue::Text("Bob".into())));
        assert_eq!(records[0].field_count(), 2);
    }

    #[test]
    fn test_missing_table_yields_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonlDirectory::open(dir.path()).unwrap();
        let table = DatasetInfo::new("nothing");

        assert!(!source.has_dataset(&table));
        assert_eq!(source.records(&table).unwrap().count(), 0);
    }

    #[test]
    fn test_bad_line_reports_location() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("t.jsonl"), "{\"id\": 1}\n{oops\n").unwrap();
        let source = JsonlDirectory::open(dir.path()).unwrap();

        let results: Vec<_> = source.records(&DatasetInfo::new("t")).unwrap().collect();
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert!(format!("{:#}", err).contains("t.jsonl\":2"));
    }
}
