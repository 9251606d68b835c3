use std::collections::HashSet;

use crate::error::{ExportError, Result};
use crate::field::FieldSpec;
use crate::value::{Row, Value};

/// Where one output field reads its inputs from inside a raw fetched tuple.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub field: FieldSpec,
    pub offset: usize,
    pub len: usize,
}

/// Mapping from output fields to the flat list of raw columns fetched once per render.
///
/// Entries are laid out back to back: offsets increase monotonically and
/// never overlap. Inputs shared by several fields are fetched once per use.
#[derive(Debug, Clone, Default)]
pub struct ColumnPlan {
    entries: Vec<PlanEntry>,
    columns: Vec<String>,
}

impl ColumnPlan {
    pub fn build(fields: &[FieldSpec]) -> Self {
        let mut plan = Self::default();
        for field in fields {
            let sources = field.source_columns();
            plan.entries.push(PlanEntry {
                field: field.clone(),
                offset: plan.columns.len(),
                len: sources.len(),
            });
            plan.columns.extend(sources);
        }
        plan
    }

    /// Raw columns to request from the collection, in fetch order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Columns requested more than once, in first-repeat order.
    pub fn duplicate_columns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for column in &self.columns {
            if !seen.insert(column.as_str()) && !dups.contains(&column.as_str()) {
                dups.push(column.as_str());
            }
        }
        dups
    }

    /// Builds one output row from one raw tuple.
    pub fn project(&self, raw: &[Value]) -> Result<Row> {
        if raw.len() < self.columns.len() {
            return Err(ExportError::Collection(format!(
                "expected {} columns per record, got {}",
                self.columns.len(),
                raw.len()
            )));
        }

        self.entries
            .iter()
            .map(|entry| match &entry.field {
                FieldSpec::Direct(_) => Ok(raw[entry.offset].clone()),
                FieldSpec::Computed(computed) => {
                    computed.call(&raw[entry.offset..entry.offset + entry.len])
                }
            })
            .collect()
    }
}
