use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use tabula_core::{
    ExportError, ModelSchema, RELATION_SEPARATOR, RawRows, RecordCollection, Result, Value,
};
use tracing::debug;

use crate::catalog::{Catalog, FieldDef, SqliteSchema, Table, TableKind, quote_ident};
use crate::sqlite_error;

/// A [`RecordCollection`] over one SQLite table or view.
///
/// Relationship paths are compiled to `LEFT JOIN`s along foreign keys, so
/// a missing related row reads as null rather than dropping the record.
#[derive(Clone)]
pub struct SqliteCollection {
    conn: Arc<Mutex<Connection>>,
    schema: Arc<SqliteSchema>,
    order_by: Vec<String>,
    declared_fields: Option<Vec<String>>,
}

impl SqliteCollection {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>, schema: SqliteSchema) -> Self {
        Self {
            conn,
            schema: Arc::new(schema),
            order_by: Vec::new(),
            declared_fields: None,
        }
    }

    pub fn table_name(&self) -> &str {
        self.schema.table_name()
    }

    /// Orders records by the given paths; a leading `-` sorts descending.
    /// Without this, tables are read in primary key (or rowid) order.
    pub fn order_by<S: AsRef<str>>(mut self, paths: &[S]) -> Self {
        self.order_by = paths.iter().map(|p| p.as_ref().to_string()).collect();
        self
    }

    /// Declares a default field list narrower than the table.
    pub fn with_field_names<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.declared_fields = Some(names.iter().map(|n| n.as_ref().to_string()).collect());
        self
    }

    /// Number of records in the table.
    pub fn count(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(self.table_name()));
        let count: i64 = self
            .conn
            .lock()
            .query_row(&sql, [], |row| row.get(0))
            .map_err(sqlite_error)?;
        Ok(count.max(0) as usize)
    }

    fn catalog(&self) -> &Catalog {
        self.schema.catalog()
    }

    fn base_table(&self) -> Result<&Table> {
        self.catalog().table(self.table_name()).ok_or_else(|| {
            ExportError::Collection(format!("no such table: {}", self.table_name()))
        })
    }

    /// Builds the `SELECT` for `columns`, returning it with each column's declared type.
    pub fn compile(&self, columns: &[String]) -> Result<(String, Vec<String>)> {
        let base = self.base_table()?;
        let columns = if columns.is_empty() {
            base.field_names()
        } else {
            columns.to_vec()
        };

        let mut query = JoinBuilder::new(self.catalog(), base);
        let mut select = Vec::with_capacity(columns.len());
        let mut types = Vec::with_capacity(columns.len());
        for path in &columns {
            let (alias, field) = query.resolve(path)?;
            select.push(format!("{alias}.{}", quote_ident(&field.column)));
            types.push(field.decl_type.clone());
        }

        let mut order = Vec::new();
        for path in &self.order_by {
            let (path, direction) = match path.strip_prefix('-') {
                Some(rest) => (rest, "DESC"),
                None => (path.as_str(), "ASC"),
            };
            let (alias, field) = query.resolve(path)?;
            order.push(format!("{alias}.{} {direction}", quote_ident(&field.column)));
        }
        if order.is_empty() {
            let pk = base.primary_key();
            if !pk.is_empty() {
                order = pk.iter().map(|c| format!("t0.{}", quote_ident(c))).collect();
            } else if base.kind == TableKind::Table {
                order.push("t0.rowid".to_string());
            }
        }

        let mut sql = format!(
            "SELECT {} FROM {} AS t0",
            select.join(", "),
            quote_ident(&base.name)
        );
        for join in &query.joins {
            sql.push(' ');
            sql.push_str(&join.clause);
        }
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        Ok((sql, types))
    }
}

impl RecordCollection for SqliteCollection {
    fn schema(&self) -> Arc<dyn ModelSchema> {
        self.schema.clone()
    }

    fn declared_field_names(&self) -> Option<Vec<String>> {
        self.declared_fields.clone()
    }

    fn values_list(&self, columns: &[String]) -> Result<RawRows<'_>> {
        let (sql, types) = self.compile(columns)?;
        debug!("Fetching {}: {sql}", self.table_name());

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(sqlite_error)?;
        let mut rows = stmt.query([]).map_err(sqlite_error)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(sqlite_error)? {
            let mut record = Vec::with_capacity(types.len());
            for (idx, decl_type) in types.iter().enumerate() {
                let raw = row.get_ref(idx).map_err(sqlite_error)?;
                record.push(to_value(raw, decl_type));
            }
            records.push(record);
        }
        debug!("Fetched {} records from {}", records.len(), self.table_name());

        Ok(Box::new(records.into_iter().map(Ok::<Vec<Value>, ExportError>)))
    }
}

// ---------------------------------------------------------------------------
// Join compilation
// ---------------------------------------------------------------------------

struct Join {
    /// Relationship path prefix this join serves (`author`, `author__department`).
    path: String,
    alias: String,
    clause: String,
}

struct JoinBuilder<'a> {
    catalog: &'a Catalog,
    base: &'a Table,
    joins: Vec<Join>,
}

impl<'a> JoinBuilder<'a> {
    fn new(catalog: &'a Catalog, base: &'a Table) -> Self {
        Self {
            catalog,
            base,
            joins: Vec::new(),
        }
    }

    /// Resolves `path` to the alias of its table and its terminal field,
    /// adding joins for any relation segment not joined yet.
    fn resolve(&mut self, path: &str) -> Result<(String, &'a FieldDef)> {
        let segments: Vec<&str> = path.split(RELATION_SEPARATOR).collect();
        let mut table = self.base;
        let mut alias = "t0".to_string();
        let mut prefix = String::new();

        for (i, segment) in segments.iter().enumerate() {
            let field = table.field(segment).ok_or_else(|| {
                ExportError::Collection(format!(
                    "Cannot resolve keyword '{segment}' into field. Choices are: {}",
                    table.field_names().join(", ")
                ))
            })?;
            if i + 1 == segments.len() {
                return Ok((alias, field));
            }

            let Some(fk) = &field.relation else {
                return Err(ExportError::Collection(format!(
                    "Cannot follow '{path}': {}.{segment} is not a relation",
                    table.name
                )));
            };
            if !prefix.is_empty() {
                prefix.push_str(RELATION_SEPARATOR);
            }
            prefix.push_str(segment);

            let target = self.catalog.table(&fk.table).ok_or_else(|| {
                ExportError::Collection(format!("no such table: {}", fk.table))
            })?;
            alias = match self.joins.iter().find(|j| j.path == prefix) {
                Some(join) => join.alias.clone(),
                None => {
                    let next = format!("t{}", self.joins.len() + 1);
                    let clause = format!(
                        "LEFT JOIN {} AS {next} ON {next}.{} = {alias}.{}",
                        quote_ident(&fk.table),
                        quote_ident(&fk.to),
                        quote_ident(&fk.column)
                    );
                    self.joins.push(Join {
                        path: prefix.clone(),
                        alias: next.clone(),
                        clause,
                    });
                    next
                }
            };
            table = target;
        }
        // `split` always yields at least one segment.
        Err(ExportError::Collection(format!("empty field path '{path}'")))
    }
}

// ---------------------------------------------------------------------------
// Value conversion
// ---------------------------------------------------------------------------

/// Converts a SQLite value, using the column's declared type to recover
/// booleans, dates and datetimes stored as integers or text.
fn to_value(raw: ValueRef<'_>, decl_type: &str) -> Value {
    match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if decl_type.starts_with("BOOL") => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            parse_temporal(&text, decl_type).unwrap_or_else(|| Value::Text(text.into_owned()))
        }
        ValueRef::Blob(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn parse_temporal(text: &str, decl_type: &str) -> Option<Value> {
    if decl_type.starts_with("DATETIME") || decl_type.starts_with("TIMESTAMP") {
        [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S%.f",
        ]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(Value::DateTime)
    } else if decl_type == "DATE" {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(Value::Date)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_collection() -> SqliteCollection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE department (id INTEGER PRIMARY KEY, name TEXT);
            CREATE TABLE author (
                id INTEGER PRIMARY KEY,
                name TEXT,
                department_id INTEGER REFERENCES department(id)
            );
            CREATE TABLE book (
                id INTEGER PRIMARY KEY,
                title TEXT,
                in_print BOOLEAN,
                published DATE,
                author_id INTEGER REFERENCES author(id)
            );
            INSERT INTO department VALUES (1, 'Fiction');
            INSERT INTO author VALUES (1, 'Herbert', 1), (2, 'Anon', NULL);
            INSERT INTO book VALUES
                (2, 'Dune Messiah', 0, '1969-10-15', 1),
                (1, 'Dune', 1, '1965-08-01', 1),
                (3, 'Untitled', NULL, NULL, NULL);
            ",
        )
        .unwrap();
        let catalog = Arc::new(Catalog::load(&conn).unwrap());
        let schema = SqliteSchema::new(catalog, "book").unwrap();
        SqliteCollection::new(Arc::new(Mutex::new(conn)), schema)
    }

    fn fetch(collection: &SqliteCollection, columns: &[&str]) -> Result<Vec<Vec<Value>>> {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        collection.values_list(&columns)?.collect()
    }

    #[test]
    fn test_compile_joins_once_per_relation() {
        let collection = test_collection();
        let columns = vec![
            "author__name".to_string(),
            "author__department__name".to_string(),
            "author__id".to_string(),
        ];
        let (sql, _) = collection.compile(&columns).unwrap();
        assert_eq!(sql.matches("LEFT JOIN").count(), 2);
        assert!(sql.contains("LEFT JOIN \"author\" AS t1 ON t1.\"id\" = t0.\"author_id\""));
        assert!(sql.contains("LEFT JOIN \"department\" AS t2 ON t2.\"id\" = t1.\"department_id\""));
        assert!(sql.ends_with("ORDER BY t0.\"id\""));
    }

    #[test]
    fn test_values_in_primary_key_order() {
        let rows = fetch(&test_collection(), &["id", "title"]).unwrap();
        assert_eq!(rows[0], vec![Value::Int(1), Value::from("Dune")]);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_relation_paths_and_nulls() {
        let rows = fetch(&test_collection(), &["author__department__name", "author"]).unwrap();
        assert_eq!(rows[0], vec![Value::from("Fiction"), Value::Int(1)]);
        // No author: the join yields nulls but the record is kept.
        assert_eq!(rows[2], vec![Value::Null, Value::Null]);
    }

    #[test]
    fn test_declared_types() {
        let rows = fetch(&test_collection(), &["in_print", "published"]).unwrap();
        assert_eq!(rows[0][0], Value::Bool(true));
        assert_eq!(
            rows[0][1],
            Value::Date(NaiveDate::from_ymd_opt(1965, 8, 1).unwrap())
        );
    }

    #[test]
    fn test_all_columns_when_none_requested() {
        let rows = fetch(&test_collection(), &[]).unwrap();
        assert_eq!(rows[0].len(), 5);
    }

    #[test]
    fn test_order_by_descending() {
        let collection = test_collection().order_by(&["-title"]);
        let rows = fetch(&collection, &["title"]).unwrap();
        assert_eq!(rows[0], vec![Value::from("Untitled")]);
    }

    #[test]
    fn test_unknown_segment_lists_choices() {
        let err = fetch(&test_collection(), &["author__email"]).unwrap_err();
        match err {
            ExportError::Collection(msg) => {
                assert!(msg.contains("'email'"));
                assert!(msg.contains("Choices are: id, name, department"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_foreign_key_column_selects_raw_id() {
        let rows = fetch(&test_collection(), &["author_id", "author_id__name"]).unwrap();
        assert_eq!(rows[0], vec![Value::Int(1), Value::from("Herbert")]);
        assert_eq!(rows[2], vec![Value::Null, Value::Null]);
    }

    #[test]
    fn test_path_through_plain_column() {
        let err = fetch(&test_collection(), &["title__length"]).unwrap_err();
        assert!(matches!(err, ExportError::Collection(_)));
    }

    #[test]
    fn test_count_and_declared_fields() {
        let collection = test_collection().with_field_names(&["title"]);
        assert_eq!(collection.count().unwrap(), 3);
        assert_eq!(collection.declared_field_names(), Some(vec!["title".to_string()]));
        assert_eq!(collection.schema().model_name(), "book");
    }

    #[test]
    fn test_to_value() {
        assert_eq!(to_value(ValueRef::Real(1.5), "REAL"), Value::Float(1.5));
        assert_eq!(to_value(ValueRef::Blob(b"abc"), ""), Value::from("abc"));
        assert_eq!(
            to_value(ValueRef::Text(b"2024-01-02 03:04:05"), "DATETIME"),
            Value::DateTime(
                NaiveDate::from_ymd_opt(2024, 1, 2)
                    .unwrap()
                    .and_hms_opt(3, 4, 5)
                    .unwrap()
            )
        );
        assert_eq!(
            to_value(ValueRef::Text(b"2024-01-02 03:04:05.250"), "DATETIME"),
            Value::DateTime(
                NaiveDate::from_ymd_opt(2024, 1, 2)
                    .unwrap()
                    .and_hms_milli_opt(3, 4, 5, 250)
                    .unwrap()
            )
        );
        assert_eq!(to_value(ValueRef::Text(b"soon"), "DATE"), Value::from("soon"));
    }
}
