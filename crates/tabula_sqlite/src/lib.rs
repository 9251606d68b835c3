// SQLite-backed record collections

pub mod catalog;
pub mod collection;
pub mod source;

pub use catalog::{Catalog, SqliteSchema};
pub use collection::SqliteCollection;
pub use source::SqliteSource;

use tabula_core::ExportError;

/// Backend failures surface as collection errors.
pub(crate) fn sqlite_error(e: rusqlite::Error) -> ExportError {
    ExportError::Collection(e.to_string())
}
