use std::cell::Cell;

use rusqlite::Connection;
use serde::Deserialize;
use tracing::debug;

use crate::schema::TableId;

/// Identifier quoting pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStyle {
    /// `[name]`
    #[default]
    Brackets,
    /// `"name"`
    Double,
    /// `` `name` ``
    Backtick,
}

impl QuoteStyle {
    pub fn pair(self) -> (char, char) {
        match self {
            QuoteStyle::Brackets => ('[', ']'),
            QuoteStyle::Double => ('"', '"'),
            QuoteStyle::Backtick => ('`', '`'),
        }
    }

    pub fn quote(self, ident: &str) -> String {
        let (open, close) = self.pair();
        let mut quoted = String::with_capacity(ident.len() + 2);
        quoted.push(open);
        for c in ident.chars() {
            // Brackets have no escape form; the other styles double the quote
            if c == close && open == close {
                quoted.push(c);
            }
            quoted.push(c);
        }
        quoted.push(close);
        quoted
    }
}

/// Driver-specific hooks the seeding engine relies on
///
/// Every suspend call is paired with its resume call by the session, on all
/// exit paths.
pub trait Backend {
    fn quote(&self, ident: &str) -> String;

    /// Schema-qualified, quoted table name
    fn table_name(&self, table: &TableId) -> String {
        match &table.schema {
            Some(schema) => format!("{}.{}", self.quote(schema), self.quote(&table.name)),
            None => self.quote(&table.name),
        }
    }

    fn suspend_constraints(&self, conn: &Connection, table: &TableId) -> rusqlite::Result<()>;

    fn resume_constraints(&self, conn: &Connection, table: &TableId) -> rusqlite::Result<()>;

    fn suspend_auto_increment(&self, conn: &Connection, table: &TableId)
        -> rusqlite::Result<()>;

    fn resume_auto_increment(&self, conn: &Connection, table: &TableId) -> rusqlite::Result<()>;

    /// Allow explicit values for generated columns of `table` in the next inserts
    fn enable_identity_insert(&self, _conn: &Connection, _table: &TableId) -> rusqlite::Result<()> {
        Ok(())
    }

    fn disable_identity_insert(
        &self,
        _conn: &Connection,
        _table: &TableId,
    ) -> rusqlite::Result<()> {
        Ok(())
    }
}

/// SQLite hooks
///
/// Constraint suspension toggles `PRAGMA foreign_keys` and restores whatever
/// value was in effect before. SQLite always honours explicit rowid values, so
/// auto-increment suspension and identity insert are no-ops.
#[derive(Debug, Default)]
pub struct SqliteBackend {
    quote: QuoteStyle,
    saved_foreign_keys: Cell<Option<bool>>,
}

impl SqliteBackend {
    pub fn new(quote: QuoteStyle) -> Self {
        Self {
            quote,
            saved_foreign_keys: Cell::new(None),
        }
    }

    /// Whether foreign key enforcement is currently on for `conn`
    pub fn foreign_keys_enabled(conn: &Connection) -> rusqlite::Result<bool> {
        conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))
    }
}

impl Backend for SqliteBackend {
    fn quote(&self, ident: &str) -> String {
        self.quote.quote(ident)
    }

    fn suspend_constraints(&self, conn: &Connection, table: &TableId) -> rusqlite::Result<()> {
        let enabled = Self::foreign_keys_enabled(conn)?;
        // PRAGMA foreign_keys is a no-op inside a transaction, so this must run first
        conn.execute_batch("PRAGMA foreign_keys = OFF")?;
        self.saved_foreign_keys.set(Some(enabled));
        debug!(table = %table, was_enabled = enabled, "foreign keys suspended");
        Ok(())
    }

    fn resume_constraints(&self, conn: &Connection, table: &TableId) -> rusqlite::Result<()> {
        if let Some(enabled) = self.saved_foreign_keys.take() {
            let sql = if enabled {
                "PRAGMA foreign_keys = ON"
            } else {
                "PRAGMA foreign_keys = OFF"
            };
            conn.execute_batch(sql)?;
            debug!(table = %table, enabled, "foreign keys restored");
        }
        Ok(())
    }

    fn suspend_auto_increment(
        &self,
        _conn: &Connection,
        _table: &TableId,
    ) -> rusqlite::Result<()> {
        Ok(())
    }

    fn resume_auto_increment(&self, _conn: &Connection, _table: &TableId) -> rusqlite::Result<()> {
        Ok(())
    }
}
