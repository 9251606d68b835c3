use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ExportError, Result};
use crate::value::Value;

type ComputeFn = dyn Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync;

/// A named, multi-input derivation producing one value per record.
#[derive(Clone)]
pub struct ComputedField {
    name: String,
    inputs: Vec<String>,
    label: Option<String>,
    func: Arc<ComputeFn>,
}

impl ComputedField {
    /// `func` receives exactly the values of `inputs`, in the declared order.
    pub fn new<F>(name: &str, inputs: &[&str], func: F) -> Self
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            label: None,
            func: Arc::new(func),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn call(&self, values: &[Value]) -> Result<Value> {
        (self.func)(values).map_err(|reason| ExportError::ComputedField {
            field: self.name.clone(),
            reason,
        })
    }
}

impl fmt::Debug for ComputedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedField")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// One output column: either read straight from the collection or computed.
#[derive(Debug, Clone)]
pub enum FieldSpec {
    /// A field name or relationship path.
    Direct(String),
    Computed(ComputedField),
}

impl FieldSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Direct(path) => path,
            Self::Computed(c) => c.name(),
        }
    }

    /// Raw columns this field needs from the bulk fetch.
    pub fn source_columns(&self) -> Vec<String> {
        match self {
            Self::Direct(path) => vec![path.clone()],
            Self::Computed(c) => c.inputs().to_vec(),
        }
    }
}

/// Computed fields registered on a renderer, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct ComputedFields {
    fields: BTreeMap<String, ComputedField>,
}

impl ComputedFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `field`, replacing any earlier field with the same name.
    pub fn register(&mut self, field: ComputedField) {
        self.fields.insert(field.name.clone(), field);
    }

    pub fn get(&self, name: &str) -> Option<&ComputedField> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Turns field identifiers into specs. A name matching a registered
    /// computed field becomes [`FieldSpec::Computed`]; anything else is direct.
    pub fn resolve(&self, fields: &[String]) -> Vec<FieldSpec> {
        fields
            .iter()
            .map(|name| match self.get(name) {
                Some(computed) => FieldSpec::Computed(computed.clone()),
                None => FieldSpec::Direct(name.clone()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_name() -> ComputedField {
        ComputedField::new("full_name", &["first_name", "last_name"], |v| {
            Ok(Value::Text(format!("{} {}", v[0], v[1])))
        })
    }

    #[test]
    fn test_computed_field_call() {
        let field = full_name();
        let out = field.call(&[Value::from("Ada"), Value::from("Lovelace")]).unwrap();
        assert_eq!(out, Value::from("Ada Lovelace"));
    }

    #[test]
    fn test_computed_field_error_carries_name() {
        let field = ComputedField::new("ratio", &["a", "b"], |_| Err("division by zero".into()));
        let err = field.call(&[Value::Int(1), Value::Int(0)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Computed field 'ratio' failed: division by zero"
        );
    }

    #[test]
    fn test_resolve_mixes_direct_and_computed() {
        let mut registry = ComputedFields::new();
        registry.register(full_name().with_label("Name"));

        let specs = registry.resolve(&["id".to_string(), "full_name".to_string(), "author__name".to_string()]);
        assert!(matches!(&specs[0], FieldSpec::Direct(p) if p == "id"));
        assert!(matches!(&specs[1], FieldSpec::Computed(c) if c.label() == Some("Name")));
        assert!(matches!(&specs[2], FieldSpec::Direct(p) if p == "author__name"));
    }

    #[test]
    fn test_source_columns() {
        assert_eq!(FieldSpec::Direct("id".into()).source_columns(), vec!["id"]);
        assert_eq!(
            FieldSpec::Computed(full_name()).source_columns(),
            vec!["first_name", "last_name"]
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ComputedFields::new();
        registry.register(full_name());
        registry.register(full_name().with_label("Full"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("full_name").unwrap().label(), Some("Full"));
    }
}
