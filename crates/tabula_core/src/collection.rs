use std::sync::Arc;

use crate::error::Result;
use crate::schema::ModelSchema;
use crate::value::Value;

/// Raw tuples produced by a bulk fetch, in collection order.
pub type RawRows<'a> = Box<dyn Iterator<Item = Result<Vec<Value>>> + 'a>;

/// An ordered, schema-bearing source of records.
///
/// The exporter only reads from a collection; it never mutates it.
pub trait RecordCollection {
    fn schema(&self) -> Arc<dyn ModelSchema>;

    /// A narrower default field list than the full schema, if the collection declares one.
    fn declared_field_names(&self) -> Option<Vec<String>> {
        None
    }

    /// Fetches every record as a flat tuple restricted to `columns`, in order.
    ///
    /// Each column is a field name or a relationship path. An empty slice
    /// selects every natural column of the record. Invalid column references
    /// fail with the backend's own error.
    fn values_list(&self, columns: &[String]) -> Result<RawRows<'_>>;
}
