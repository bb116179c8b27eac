use rusqlite::Connection;
use tracing::debug;

/// Turns a connection string into a database connection
pub trait ConnectionProvider {
    fn connect(&self, connection_string: &str) -> rusqlite::Result<Connection>;
}

/// Opens SQLite databases by path (`:memory:` for an in-memory database)
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteConnector;

impl ConnectionProvider for SqliteConnector {
    fn connect(&self, connection_string: &str) -> rusqlite::Result<Connection> {
        debug!(path = connection_string, "opening sqlite database");
        Connection::open(connection_string)
    }
}

impl<F> ConnectionProvider for F
where
    F: Fn(&str) -> rusqlite::Result<Connection>,
{
    fn connect(&self, connection_string: &str) -> rusqlite::Result<Connection> {
        self(connection_string)
    }
}
