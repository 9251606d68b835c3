use std::collections::BTreeMap;
use std::sync::Arc;

use crate::collection::{RawRows, RecordCollection};
use crate::error::{ExportError, Result};
use crate::schema::{ModelSchema, RELATION_SEPARATOR, Schema};
use crate::value::Value;

/// A record held in memory: plain values plus nested related records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Value>,
    related: BTreeMap<String, Record>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn with_related(mut self, name: &str, record: Record) -> Self {
        self.related.insert(name.to_string(), record);
        self
    }

    /// Follows `path` through related records. Missing data reads as null.
    pub fn lookup(&self, path: &str) -> Value {
        match path.split_once(RELATION_SEPARATOR) {
            Some((relation, rest)) => self
                .related
                .get(relation)
                .map_or(Value::Null, |record| record.lookup(rest)),
            None => self.values.get(path).cloned().unwrap_or_default(),
        }
    }
}

/// A [`RecordCollection`] over records kept in a `Vec`.
pub struct MemoryCollection {
    schema: Arc<Schema>,
    records: Vec<Record>,
    declared_fields: Option<Vec<String>>,
}

impl MemoryCollection {
    pub fn new(schema: Arc<Schema>, records: Vec<Record>) -> Self {
        Self {
            schema,
            records,
            declared_fields: None,
        }
    }

    /// Declares a default field list narrower than the schema.
    pub fn with_field_names(mut self, names: &[&str]) -> Self {
        self.declared_fields = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordCollection for MemoryCollection {
    fn schema(&self) -> Arc<dyn ModelSchema> {
        self.schema.clone()
    }

    fn declared_field_names(&self) -> Option<Vec<String>> {
        self.declared_fields.clone()
    }

    fn values_list(&self, columns: &[String]) -> Result<RawRows<'_>> {
        let columns = if columns.is_empty() {
            self.schema.field_names()
        } else {
            columns.to_vec()
        };
        for column in &columns {
            check_path(self.schema.as_ref(), column)?;
        }

        Ok(Box::new(self.records.iter().map(
            move |record| -> Result<Vec<Value>> {
                Ok(columns.iter().map(|c| record.lookup(c)).collect())
            },
        )))
    }
}

/// Rejects paths the schema cannot resolve, naming the valid choices.
fn check_path(schema: &dyn ModelSchema, path: &str) -> Result<()> {
    let (head, rest) = match path.split_once(RELATION_SEPARATOR) {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let field = schema.field(head).map_err(|_| {
        ExportError::Collection(format!(
            "Cannot resolve keyword '{head}' into field. Choices are: {}",
            schema.field_names().join(", ")
        ))
    })?;
    match rest {
        Some(rest) if field.is_relation => check_path(schema.related_schema(head)?.as_ref(), rest),
        Some(_) => Err(ExportError::Collection(format!(
            "Cannot follow '{path}': {}.{head} is not a relation",
            schema.model_name()
        ))),
        None => Ok(()),
    }
}
