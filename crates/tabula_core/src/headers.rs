use crate::error::Result;
use crate::field::{ComputedField, FieldSpec};
use crate::schema::{ModelSchema, RELATION_SEPARATOR};
use crate::value::HeaderRow;

/// One display label per field, in field order.
///
/// Relationship paths are resolved against `schema`; a segment that names no
/// field fails with [`ExportError::FieldNotFound`](crate::error::ExportError).
pub fn generate_headers(schema: &dyn ModelSchema, fields: &[FieldSpec]) -> Result<HeaderRow> {
    fields
        .iter()
        .map(|field| match field {
            FieldSpec::Computed(computed) => Ok(computed_label(computed)),
            FieldSpec::Direct(path) => path_label(schema, path),
        })
        .collect()
}

fn computed_label(field: &ComputedField) -> String {
    match field.label() {
        Some(label) => label.to_string(),
        None => title_case(&field.name().replace('_', " ")),
    }
}

/// Verbose names along `path`, joined with spaces and title-cased.
pub fn path_label(schema: &dyn ModelSchema, path: &str) -> Result<String> {
    let parts = verbose_names(schema, path)?;
    Ok(title_case(&parts.join(" ")))
}

fn verbose_names(schema: &dyn ModelSchema, path: &str) -> Result<Vec<String>> {
    match path.split_once(RELATION_SEPARATOR) {
        Some((relation, rest)) => {
            let field = schema.field(relation)?;
            let related = schema.related_schema(relation)?;
            let mut names = vec![field.verbose_name];
            names.extend(verbose_names(related.as_ref(), rest)?);
            Ok(names)
        }
        None => Ok(vec![schema.field(path)?.verbose_name]),
    }
}

/// Upper-cases the first letter of every word and lower-cases the rest.
///
/// A word starts at any letter not preceded by another letter, so
/// `"e-mail address"` becomes `"E-Mail Address"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}
