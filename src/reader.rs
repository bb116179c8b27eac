use rusqlite::Connection;

use crate::parser::{DataRecord, SqlValue};
use crate::schema::TableId;
use crate::writer::Backend;

/// Read every row of a table as records, columns in table order
pub fn read_table(
    conn: &Connection,
    backend: &dyn Backend,
    table: &TableId,
) -> rusqlite::Result<Vec<DataRecord>> {
    let sql = format!("SELECT * FROM {}", backend.table_name(table));
    let mut stmt = conn.prepare(&sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut records = Vec::new();
    let mut rows = stmt.query([])?;

    while let Some(row) = rows.next()? {
        let mut record = DataRecord::new();
        for (i, column) in columns.iter().enumerate() {
            record.push(column.clone(), SqlValue::from(row.get_ref(i)?));
        }
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::SqliteBackend;

    #[test]
    fn test_read_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT, weight REAL, data BLOB);
             INSERT INTO items VALUES (1, 'bolt', 0.5, x'0102'), (2, NULL, 2, NULL);",
        )
        .unwrap();

        let rows = read_table(&conn, &SqliteBackend::default(), &TableId::new("items")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            DataRecord::new()
                .with("id", 1i64)
                .with("label", "bolt")
                .with("weight", 0.5)
                .with("data", SqlValue::Blob(vec![1, 2]))
        );
        assert_eq!(rows[1].get("label"), Some(&SqlValue::Null));
        assert_eq!(rows[1].get("weight"), Some(&SqlValue::Real(2.0)));
    }
}
