use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tabula_core::{ModelSchema, RecordCollection, TabulaConfig};
use tabula_docs::{ExportOptions, ExportRenderer};
use tabula_sqlite::SqliteSource;
use tracing::info;

use crate::cli::{DescribeArgs, ExportArgs};

/// Renders the table and writes it to disk. Returns the path written.
pub fn run_export(args: &ExportArgs, config: &TabulaConfig) -> Result<PathBuf> {
    let source = SqliteSource::open(&args.db)?;
    let mut collection = source
        .collection(&args.table)
        .with_context(|| format!("Cannot export table '{}'", args.table))?;
    if let Some(order_by) = &args.order_by {
        collection = collection.order_by(order_by.as_slice());
    }

    let mut options = ExportOptions::new().collection(Arc::new(collection));
    options.fields = args.fields.clone();
    options.headers = args.headers.clone();
    options.format = args.format.clone();
    options.filename = args.filename.clone();

    let renderer = ExportRenderer::from_config(config);
    let response = renderer.render(&options).context("Export failed")?;

    let out = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(response.filename()));
    response.write_to(&out)?;
    info!(
        "Wrote {} ({}) to {}",
        response.filename(),
        response.content_type(),
        out.display()
    );
    Ok(out)
}

/// Resolved fields and headers for one table, or a listing of every table.
pub fn run_describe(args: &DescribeArgs, config: &TabulaConfig) -> Result<serde_json::Value> {
    let source = SqliteSource::open(&args.db)?;

    let Some(table) = &args.table else {
        let mut tables = Vec::new();
        for name in source.table_names() {
            let schema = source.schema(&name)?;
            tables.push(json!({ "table": name, "fields": schema.field_names() }));
        }
        return Ok(json!({ "tables": tables }));
    };

    let collection = Arc::new(source.collection(table)?);
    let mut options = ExportOptions::new().collection(collection.clone());
    options.fields = args.fields.clone();

    let setup = ExportRenderer::from_config(config).render_setup(&options)?;
    Ok(json!({
        "table": table,
        "records": collection.count()?,
        "fields": setup.field_names(),
        "headers": setup.headers,
        "relations": relations(collection.schema().as_ref())?,
    }))
}

fn relations(schema: &dyn ModelSchema) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for name in schema.field_names() {
        if schema.field(&name)?.is_relation {
            let related = schema.related_schema(&name)?;
            names.push(format!("{name} -> {}", related.model_name()));
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn library() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("library.db");
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch(
            "
            CREATE TABLE author (id INTEGER PRIMARY KEY, name TEXT);
            CREATE TABLE book (
                id INTEGER PRIMARY KEY,
                title TEXT,
                author_id INTEGER REFERENCES author(id)
            );
            INSERT INTO author VALUES (1, 'Le Guin');
            INSERT INTO book VALUES (1, 'The Dispossessed', 1), (2, 'Lathe of Heaven', 1);
            ",
        )
        .unwrap();
        (dir, db)
    }

    fn export_args(db: PathBuf, out: PathBuf) -> ExportArgs {
        ExportArgs {
            db,
            table: "book".into(),
            fields: Some(vec!["title".into(), "author__name".into()]),
            headers: None,
            order_by: Some(vec!["-id".into()]),
            format: Some("csv".into()),
            filename: None,
            out: Some(out),
        }
    }

    #[test]
    fn test_export_writes_csv() {
        let (dir, db) = library();
        let out = dir.path().join("books.csv");

        let written = run_export(&export_args(db, out.clone()), &TabulaConfig::default()).unwrap();
        assert_eq!(written, out);
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "Title,Author Name\r\nLathe of Heaven,Le Guin\r\nThe Dispossessed,Le Guin\r\n"
        );
    }

    #[test]
    fn test_export_uses_configured_format() {
        let (dir, db) = library();
        let mut args = export_args(db, dir.path().join("books.xlsx"));
        args.format = None;

        let mut config = TabulaConfig::default();
        config.export.format = Some("excel".into());
        let written = run_export(&args, &config).unwrap();
        assert_eq!(&std::fs::read(written).unwrap()[0..2], b"PK");
    }

    #[test]
    fn test_export_unknown_table() {
        let (dir, db) = library();
        let mut args = export_args(db, dir.path().join("x.csv"));
        args.table = "magazine".into();
        let err = run_export(&args, &TabulaConfig::default()).unwrap_err();
        assert!(err.to_string().contains("magazine"));
    }

    #[test]
    fn test_describe_table() {
        let (_dir, db) = library();
        let args = DescribeArgs {
            db,
            table: Some("book".into()),
            fields: None,
        };
        let described = run_describe(&args, &TabulaConfig::default()).unwrap();
        assert_eq!(described["records"], 2);
        assert_eq!(described["fields"], json!(["id", "title", "author"]));
        assert_eq!(described["headers"], json!(["Id", "Title", "Author"]));
        assert_eq!(described["relations"], json!(["author -> author"]));
    }

    #[test]
    fn test_describe_lists_tables() {
        let (_dir, db) = library();
        let args = DescribeArgs {
            db,
            table: None,
            fields: None,
        };
        let described = run_describe(&args, &TabulaConfig::default()).unwrap();
        assert_eq!(described["tables"][0]["table"], "author");
        assert_eq!(described["tables"][1]["fields"], json!(["id", "title", "author"]));
    }
}
