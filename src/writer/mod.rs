pub mod backend;
pub mod entity;
pub mod orm;
pub mod raw_sql;

pub use backend::*;
pub use entity::*;
pub use orm::*;
pub use raw_sql::*;

use rusqlite::Connection;

use crate::error::WriteError;
use crate::parser::Record;
use crate::schema::TableId;

/// Persists one record into the table currently being seeded
pub trait RecordWriter {
    fn write_record(
        &mut self,
        conn: &Connection,
        backend: &dyn Backend,
        table: &TableId,
        record: &dyn Record,
    ) -> Result<(), WriteError>;
}
