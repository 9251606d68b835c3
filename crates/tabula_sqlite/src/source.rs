use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

use crate::catalog::{Catalog, SqliteSchema};
use crate::collection::SqliteCollection;

/// An open SQLite database and its catalog.
///
/// The catalog is read when the source is opened; call [`SqliteSource::refresh`]
/// after changing the schema through [`SqliteSource::execute_batch`].
pub struct SqliteSource {
    conn: Arc<Mutex<Connection>>,
    catalog: Arc<Catalog>,
}

impl SqliteSource {
    /// Opens the database file at `path`. Fails if it does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Database not found: {}", path.display());
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let source = Self::from_connection(conn)?;
        info!(
            "Database opened at {} ({} tables)",
            path.display(),
            source.catalog.table_names().len()
        );
        Ok(source)
    }

    /// Opens an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let catalog = Catalog::load(&conn).context("Failed to read database schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            catalog: Arc::new(catalog),
        })
    }

    /// Runs SQL statements and reloads the catalog.
    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.conn
            .lock()
            .execute_batch(sql)
            .context("Failed to execute SQL batch")?;
        self.refresh()
    }

    /// Re-reads tables, columns and foreign keys. Collections created earlier
    /// keep the catalog they were created with.
    pub fn refresh(&mut self) -> Result<()> {
        let catalog = Catalog::load(&self.conn.lock()).context("Failed to read database schema")?;
        self.catalog = Arc::new(catalog);
        Ok(())
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn table_names(&self) -> Vec<String> {
        self.catalog.table_names()
    }

    pub fn schema(&self, table: &str) -> tabula_core::Result<SqliteSchema> {
        SqliteSchema::new(self.catalog.clone(), table)
    }

    /// A collection over every record of `table`.
    pub fn collection(&self, table: &str) -> tabula_core::Result<SqliteCollection> {
        Ok(SqliteCollection::new(self.conn.clone(), self.schema(table)?))
    }
}
