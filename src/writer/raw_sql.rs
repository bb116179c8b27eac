use rusqlite::types::ToSql;
use rusqlite::Connection;
use tracing::trace;

use super::backend::Backend;
use super::RecordWriter;
use crate::error::WriteError;
use crate::parser::Record;
use crate::schema::TableId;

/// Inserts each record with a parameterized `INSERT` built from its own field names
///
/// Fields present in the record are inserted as-is, generated columns included.
/// Any execution failure is returned unchanged.
#[derive(Debug, Default)]
pub struct RawSqlWriter;

impl RawSqlWriter {
    pub fn new() -> Self {
        Self
    }
}

impl RecordWriter for RawSqlWriter {
    fn write_record(
        &mut self,
        conn: &Connection,
        backend: &dyn Backend,
        table: &TableId,
        record: &dyn Record,
    ) -> Result<(), WriteError> {
        if record.field_count() == 0 {
            return Err(WriteError::EmptyRecord);
        }

        let params = parameter_names(record);
        let sql = generate_insert(backend, table, record, &params);
        trace!(%sql, "insert");

        let mut stmt = conn.prepare_cached(&sql)?;
        let bound: Vec<(&str, &dyn ToSql)> = params
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), record.value(i) as &dyn ToSql))
            .collect();
        stmt.execute(bound.as_slice())?;

        Ok(())
    }
}

/// Generate the INSERT statement for a record using the given parameter names
pub fn generate_insert(
    backend: &dyn Backend,
    table: &TableId,
    record: &dyn Record,
    params: &[String],
) -> String {
    let columns: Vec<String> = (0..record.field_count())
        .map(|i| backend.quote(record.field_name(i)))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        backend.table_name(table),
        columns.join(", "),
        params.join(", ")
    )
}

/// One named parameter per field; collisions after normalization get a numeric
/// suffix, starting at the field index and bumped until the name is unused
pub fn parameter_names(record: &dyn Record) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(record.field_count());

    for i in 0..record.field_count() {
        let base = to_parameter_name(record.field_name(i));
        let mut name = base.clone();
        let mut suffix = i;
        while names.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        names.push(name);
    }

    names
}

/// `@` plus the lowercased field name with anything but `[a-z0-9_]` replaced by `_`
fn to_parameter_name(field: &str) -> String {
    let mut result = String::with_capacity(field.len() + 1);
    result.push('@');

    for c in field.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            result.push(c.to_ascii_lowercase());
        } else {
            result.push('_');
        }
    }

    result
}
