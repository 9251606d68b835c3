use std::sync::Arc;

use tracing::debug;

use crate::collection::RecordCollection;
use crate::error::{ExportError, Result};
use crate::schema::ModelSchema;

/// Picks the fields to export; the first source that yields a list wins.
///
/// 1. `explicit`, even when empty
/// 2. `configured`, when non-empty
/// 3. the collection's declared field list
/// 4. every field of the collection's schema
/// 5. every field of `default_model`
///
/// Returns an empty list when none applies.
pub fn resolve_fields(
    explicit: Option<&[String]>,
    configured: Option<&[String]>,
    collection: Option<&dyn RecordCollection>,
    default_model: Option<&dyn ModelSchema>,
) -> Vec<String> {
    if let Some(fields) = explicit {
        return fields.to_vec();
    }
    if let Some(fields) = configured.filter(|f| !f.is_empty()) {
        return fields.to_vec();
    }
    if let Some(collection) = collection {
        if let Some(declared) = collection.declared_field_names() {
            return declared;
        }
        let names = collection.schema().field_names();
        if !names.is_empty() {
            return names;
        }
    }
    if let Some(model) = default_model {
        debug!("Falling back to fields of model {}", model.model_name());
        return model.field_names();
    }
    Vec::new()
}

/// Returns the explicit collection, else the configured default.
pub fn resolve_collection(
    explicit: Option<Arc<dyn RecordCollection>>,
    default: Option<&Arc<dyn RecordCollection>>,
) -> Result<Arc<dyn RecordCollection>> {
    explicit.or_else(|| default.cloned()).ok_or_else(|| {
        ExportError::Configuration(
            "no collection provided; pass one in or configure a default".into(),
        )
    })
}
