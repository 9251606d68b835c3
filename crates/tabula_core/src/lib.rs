// Export model: records, field specs, column plans, rows and headers.

pub mod collection;
pub mod config;
pub mod error;
pub mod field;
pub mod headers;
pub mod logging;
pub mod memory;
pub mod plan;
pub mod resolve;
pub mod rows;
pub mod schema;
pub mod value;

pub use collection::{RawRows, RecordCollection};
pub use config::{RendererConfig, TabulaConfig};
pub use error::{ErrorCategory, ExportError, Result};
pub use field::{ComputedField, ComputedFields, FieldSpec};
pub use headers::{generate_headers, title_case};
pub use memory::{MemoryCollection, Record};
pub use plan::{ColumnPlan, PlanEntry};
pub use resolve::{resolve_collection, resolve_fields};
pub use rows::{RowGenerator, generate_rows};
pub use schema::{FieldMeta, ModelSchema, RELATION_SEPARATOR, Schema};
pub use value::{HeaderRow, Row, Value};
