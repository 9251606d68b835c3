use tracing::{debug, warn};

use crate::collection::{RawRows, RecordCollection};
use crate::error::Result;
use crate::field::FieldSpec;
use crate::plan::ColumnPlan;
use crate::value::Row;

/// Lazily turns fetched raw tuples into output rows, one per record.
///
/// Not restartable: generate a new one to iterate again.
pub struct RowGenerator<'a> {
    raw: RawRows<'a>,
    plan: Option<ColumnPlan>,
}

impl RowGenerator<'_> {
    /// `None` in pass-through mode (no fields requested).
    pub fn plan(&self) -> Option<&ColumnPlan> {
        self.plan.as_ref()
    }
}

impl Iterator for RowGenerator<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.raw.next()?;
        Some(raw.and_then(|raw| match &self.plan {
            Some(plan) => plan.project(&raw),
            None => Ok(raw),
        }))
    }
}

/// Builds the column plan for `fields` and starts the bulk fetch.
///
/// With no fields every record's natural column tuple is passed through
/// unchanged. Unknown columns are not checked here; the collection reports them.
pub fn generate_rows<'a>(
    collection: &'a dyn RecordCollection,
    fields: &[FieldSpec],
) -> Result<RowGenerator<'a>> {
    if fields.is_empty() {
        debug!("No fields requested, passing records through");
        return Ok(RowGenerator {
            raw: collection.values_list(&[])?,
            plan: None,
        });
    }

    let plan = ColumnPlan::build(fields);
    let duplicates = plan.duplicate_columns();
    if !duplicates.is_empty() {
        warn!("Columns fetched more than once: {}", duplicates.join(", "));
    }
    debug!(
        "Column plan: {} fields over {} raw columns",
        plan.entries().len(),
        plan.columns().len()
    );

    let raw = collection.values_list(plan.columns())?;
    Ok(RowGenerator {
        raw,
        plan: Some(plan),
    })
}
