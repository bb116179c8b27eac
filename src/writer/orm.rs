use rusqlite::types::ToSql;
use rusqlite::Connection;
use tracing::debug;

use super::backend::Backend;
use super::entity::{Entity, EntityRegistry};
use super::RecordWriter;
use crate::error::WriteError;
use crate::parser::{Record, SqlValue};
use crate::schema::{ColumnDescriptor, TableDescriptor, TableId};

/// Handle to an entity tracked by a [`ChangeTracker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryId(u64);

struct TrackedEntry {
    id: EntryId,
    table: TableId,
    generated: Vec<String>,
    computed: Vec<String>,
    entity: Box<dyn Entity>,
}

/// Unit of work holding entities that are added but not yet saved
///
/// A failed save leaves the failing entry (and everything after it) tracked;
/// callers detach it so later saves do not retry it.
#[derive(Default)]
pub struct ChangeTracker {
    next_id: u64,
    added: Vec<TrackedEntry>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, table: &TableDescriptor, entity: Box<dyn Entity>) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;

        self.added.push(TrackedEntry {
            id,
            table: table.id.clone(),
            generated: column_names(table, |c| c.is_generated),
            computed: column_names(table, |c| c.is_computed),
            entity,
        });
        id
    }

    /// Stop tracking an entry without saving it
    pub fn detach(&mut self, id: EntryId) -> Option<Box<dyn Entity>> {
        let pos = self.added.iter().position(|e| e.id == id)?;
        Some(self.added.remove(pos).entity)
    }

    pub fn pending(&self) -> usize {
        self.added.len()
    }

    /// Insert all pending entities, letting the database assign generated columns
    pub fn save_changes(
        &mut self,
        conn: &Connection,
        backend: &dyn Backend,
    ) -> Result<usize, WriteError> {
        self.save(conn, backend, false)
    }

    /// Insert all pending entities keeping caller-supplied values for identity columns
    pub fn save_changes_with_identity(
        &mut self,
        conn: &Connection,
        backend: &dyn Backend,
        table: &TableId,
    ) -> Result<usize, WriteError> {
        backend.enable_identity_insert(conn, table)?;
        let saved = self.save(conn, backend, true);
        let restored = backend.disable_identity_insert(conn, table);

        let saved = saved?;
        restored?;
        Ok(saved)
    }

    fn save(
        &mut self,
        conn: &Connection,
        backend: &dyn Backend,
        include_generated: bool,
    ) -> Result<usize, WriteError> {
        let mut saved = 0;

        while let Some(entry) = self.added.first() {
            insert_entity(conn, backend, entry, include_generated)?;
            self.added.remove(0);
            saved += 1;
        }

        Ok(saved)
    }
}

fn column_names(table: &TableDescriptor, keep: impl Fn(&ColumnDescriptor) -> bool) -> Vec<String> {
    table
        .columns
        .iter()
        .filter(|c| keep(c))
        .map(|c| c.name.clone())
        .collect()
}

fn insert_entity(
    conn: &Connection,
    backend: &dyn Backend,
    entry: &TrackedEntry,
    include_generated: bool,
) -> Result<(), WriteError> {
    let values: Vec<(String, SqlValue)> = entry
        .entity
        .values()
        .into_iter()
        .filter(|(column, _)| !entry.computed.contains(column))
        .filter(|(column, _)| include_generated || !entry.generated.contains(column))
        .collect();

    let table_name = backend.table_name(&entry.table);

    if values.is_empty() {
        conn.execute(&format!("INSERT INTO {} DEFAULT VALUES", table_name), [])?;
        return Ok(());
    }

    let columns: Vec<String> = values.iter().map(|(c, _)| backend.quote(c)).collect();
    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table_name,
        columns.join(", "),
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    let params: Vec<&dyn ToSql> = values.iter().map(|(_, v)| v as &dyn ToSql).collect();
    stmt.execute(params.as_slice())?;

    Ok(())
}

/// Materializes each record as a mapped entity and saves it through a [`ChangeTracker`]
///
/// Tables with generated columns are saved in identity-preserving mode so the
/// source keys survive. A failed save detaches the entity and returns the error;
/// whether the run continues is decided by the session's error policy.
pub struct OrmEntityWriter {
    registry: EntityRegistry,
    tracker: ChangeTracker,
}

impl OrmEntityWriter {
    pub fn new(registry: EntityRegistry) -> Self {
        Self {
            registry,
            tracker: ChangeTracker::new(),
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Entities still tracked; zero after every completed write
    pub fn pending(&self) -> usize {
        self.tracker.pending()
    }
}

impl RecordWriter for OrmEntityWriter {
    fn write_record(
        &mut self,
        conn: &Connection,
        backend: &dyn Backend,
        table: &TableId,
        record: &dyn Record,
    ) -> Result<(), WriteError> {
        let mapping = self
            .registry
            .get(table)
            .ok_or_else(|| WriteError::UnmappedTable(table.to_string()))?;

        let mut entity = mapping.create();
        let mut has_generated = false;

        for column in &mapping.descriptor.columns {
            if column.is_computed {
                continue;
            }
            has_generated |= column.is_generated;
            if let Some(value) = record.get_value(&column.name, column.value_type) {
                entity.set_value(&column.name, value)?;
            }
        }

        let entry = self.tracker.add(&mapping.descriptor, entity);

        let result = if has_generated {
            self.tracker.save_changes_with_identity(conn, backend, table)
        } else {
            self.tracker.save_changes(conn, backend)
        };

        if let Err(err) = result {
            self.tracker.detach(entry);
            debug!(table = %table, error = %err, "entity save failed, detached");
            return Err(err);
        }

        Ok(())
    }
}
