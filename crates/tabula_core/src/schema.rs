use std::sync::Arc;

use crate::error::{ExportError, Result};

/// Separator between segments of a relationship path (`author__department__name`).
pub const RELATION_SEPARATOR: &str = "__";

/// Metadata for a single field on a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: String,
    /// Human-readable name, as declared on the model (usually lower case).
    pub verbose_name: String,
    pub is_relation: bool,
}

/// Schema introspection over a record type.
///
/// Lookups of names the model does not declare fail with
/// [`ExportError::FieldNotFound`].
pub trait ModelSchema {
    fn model_name(&self) -> &str;

    /// All field names in declaration order.
    fn field_names(&self) -> Vec<String>;

    fn field(&self, name: &str) -> Result<FieldMeta>;

    /// Schema of the model on the other side of relation field `name`.
    fn related_schema(&self, name: &str) -> Result<Arc<dyn ModelSchema>>;
}

// ---------------------------------------------------------------------------
// Static schema
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct SchemaField {
    meta: FieldMeta,
    related: Option<Arc<Schema>>,
}

/// A schema declared up front, used by in-memory collections and tests.
#[derive(Clone)]
pub struct Schema {
    model_name: String,
    fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a plain field whose verbose name is derived from its name.
    pub fn field(self, name: &str) -> Self {
        let verbose = default_verbose_name(name);
        self.push(name, verbose, None)
    }

    pub fn field_with_verbose_name(self, name: &str, verbose_name: &str) -> Self {
        self.push(name, verbose_name.to_string(), None)
    }

    /// Adds a relation field pointing at `related`.
    pub fn relation(self, name: &str, related: Arc<Schema>) -> Self {
        let verbose = default_verbose_name(name);
        self.push(name, verbose, Some(related))
    }

    pub fn relation_with_verbose_name(
        self,
        name: &str,
        verbose_name: &str,
        related: Arc<Schema>,
    ) -> Self {
        self.push(name, verbose_name.to_string(), Some(related))
    }

    fn push(mut self, name: &str, verbose_name: String, related: Option<Arc<Schema>>) -> Self {
        self.fields.push(SchemaField {
            meta: FieldMeta {
                name: name.to_string(),
                verbose_name,
                is_relation: related.is_some(),
            },
            related,
        });
        self
    }

    fn lookup(&self, name: &str) -> Result<&SchemaField> {
        self.fields
            .iter()
            .find(|f| f.meta.name == name)
            .ok_or_else(|| ExportError::field_not_found(&self.model_name, name))
    }
}

impl ModelSchema for Schema {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.meta.name.clone()).collect()
    }

    fn field(&self, name: &str) -> Result<FieldMeta> {
        Ok(self.lookup(name)?.meta.clone())
    }

    fn related_schema(&self, name: &str) -> Result<Arc<dyn ModelSchema>> {
        let field = self.lookup(name)?;
        match &field.related {
            Some(related) => Ok(related.clone() as Arc<dyn ModelSchema>),
            None => Err(ExportError::Collection(format!(
                "{}.{} is not a relation",
                self.model_name, name
            ))),
        }
    }
}

/// Verbose name a field gets when the model does not declare one.
pub fn default_verbose_name(name: &str) -> String {
    name.replace('_', " ")
}
