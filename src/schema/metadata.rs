use rusqlite::Connection;
use tracing::debug;

use super::graph::MetadataProvider;
use super::types::{ColumnDescriptor, ForeignKeyEdge, TableDescriptor, TableId, ValueType};
use crate::error::SchemaError;

/// Reads table metadata from a live SQLite database
pub struct SqliteMetadata<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteMetadata<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn table_names(&self) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn columns(&self, table: &str) -> rusqlite::Result<Vec<ColumnDescriptor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type, pk, hidden FROM pragma_table_xinfo(?1) ORDER BY cid")?;

        // (name, declared type, pk position, hidden)
        let raw = stmt
            .query_map([table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let pk_count = raw.iter().filter(|(_, _, pk, _)| *pk > 0).count();

        let columns = raw
            .into_iter()
            // hidden = 1 marks virtual-table internals, 2/3 are generated columns
            .filter(|(_, _, _, hidden)| *hidden != 1)
            .map(|(name, decl, pk, hidden)| {
                let rowid_alias = pk > 0 && pk_count == 1 && decl.eq_ignore_ascii_case("INTEGER");
                ColumnDescriptor {
                    value_type: ValueType::from_declared(&decl),
                    is_generated: rowid_alias,
                    is_computed: hidden >= 2,
                    name,
                }
            })
            .collect();

        Ok(columns)
    }

    /// `known` holds the canonical table names; SQLite matches REFERENCES
    /// targets case-insensitively, so principals are mapped back onto them.
    fn foreign_keys(
        &self,
        table: &TableId,
        known: &[String],
    ) -> rusqlite::Result<Vec<ForeignKeyEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;

        let rows = stmt
            .query_map([&table.name], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // Composite keys span several rows sharing the same id
        let mut edges: Vec<(i64, ForeignKeyEdge)> = Vec::new();
        for (id, principal, from, to) in rows {
            let to = to.unwrap_or_default();
            match edges.last_mut() {
                Some((last_id, edge)) if *last_id == id => {
                    edge.columns.push((from, to));
                }
                _ => {
                    let principal = canonical_name(known, principal);
                    let edge = ForeignKeyEdge::new(table.clone(), TableId::new(principal))
                        .column(from, to);
                    edges.push((id, edge));
                }
            }
        }

        Ok(edges.into_iter().map(|(_, edge)| edge).collect())
    }
}

fn canonical_name(known: &[String], name: String) -> String {
    known
        .iter()
        .find(|k| k.eq_ignore_ascii_case(&name))
        .cloned()
        .unwrap_or(name)
}

impl MetadataProvider for SqliteMetadata<'_> {
    fn tables(&self) -> Result<Vec<TableDescriptor>, SchemaError> {
        let mut tables = Vec::new();

        let names = self.table_names()?;

        for name in &names {
            let id = TableId::new(name.as_str());
            let columns = self.columns(&id.name)?;
            let foreign_keys = self.foreign_keys(&id, &names)?;
            debug!(
                table = %id,
                columns = columns.len(),
                foreign_keys = foreign_keys.len(),
                "loaded table metadata"
            );
            tables.push(TableDescriptor {
                id,
                columns,
                foreign_keys,
            });
        }

        Ok(tables)
    }
}
