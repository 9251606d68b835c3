use std::collections::BTreeMap;
use std::sync::Arc;

use rusqlite::Connection;
use tabula_core::schema::default_verbose_name;
use tabula_core::{ExportError, FieldMeta, ModelSchema, Result};
use tracing::debug;

// ---------------------------------------------------------------------------
// Catalog types
// ---------------------------------------------------------------------------

/// A column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Declared type, upper-cased (`INTEGER`, `DATE`, or empty).
    pub decl_type: String,
    pub not_null: bool,
    /// Position in the primary key, 0 when not part of it.
    pub pk: i64,
}

/// A single-column foreign key, resolved to the referenced column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub table: String,
    pub to: String,
}

/// A field as the exporter sees it: a plain column, or a relation backed by a
/// foreign-key column. `author_id REFERENCES author(id)` becomes relation `author`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub column: String,
    pub decl_type: String,
    pub relation: Option<ForeignKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Table,
    View,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<Column>,
    pub foreign_keys: Vec<ForeignKey>,
    pub fields: Vec<FieldDef>,
}

impl Table {
    /// Looks a field up by name, or a relation by its foreign-key column
    /// (`author_id` finds relation `author`).
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name).or_else(|| {
            self.fields
                .iter()
                .find(|f| f.relation.is_some() && f.column == name)
        })
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Primary key columns in key order.
    pub fn primary_key(&self) -> Vec<&str> {
        let mut pk: Vec<&Column> = self.columns.iter().filter(|c| c.pk > 0).collect();
        pk.sort_by_key(|c| c.pk);
        pk.into_iter().map(|c| c.name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Tables and views of one database, read once at open time.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: BTreeMap<String, Table>,
}

impl Catalog {
    pub fn load(conn: &Connection) -> rusqlite::Result<Self> {
        let mut stmt = conn.prepare(
            "SELECT name, type FROM sqlite_master
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let entries = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut tables = BTreeMap::new();
        for (name, kind) in entries {
            let kind = if kind == "view" {
                TableKind::View
            } else {
                TableKind::Table
            };
            let columns = load_columns(conn, &name)?;
            tables.insert(
                name.clone(),
                Table {
                    name,
                    kind,
                    columns,
                    foreign_keys: Vec::new(),
                    fields: Vec::new(),
                },
            );
        }

        // Foreign keys need every table's primary key to resolve implicit targets.
        let names: Vec<String> = tables.keys().cloned().collect();
        for name in &names {
            let foreign_keys = load_foreign_keys(conn, name, &tables)?;
            if let Some(table) = tables.get_mut(name) {
                table.fields = build_fields(&table.columns, &foreign_keys);
                table.foreign_keys = foreign_keys;
            }
        }

        debug!("Loaded catalog with {} tables", tables.len());
        Ok(Self { tables })
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

fn load_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<Column>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(Column {
                name: row.get(1)?,
                decl_type: row
                    .get::<_, Option<String>>(2)?
                    .unwrap_or_default()
                    .to_uppercase(),
                not_null: row.get::<_, i64>(3)? != 0,
                pk: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn load_foreign_keys(
    conn: &Connection,
    table: &str,
    tables: &BTreeMap<String, Table>,
) -> rusqlite::Result<Vec<ForeignKey>> {
    let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", quote_ident(table)))?;
    // (id, seq, table, from, to)
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut foreign_keys = Vec::new();
    for (id, seq, target, from, to) in &rows {
        // Composite keys cannot be followed as a single relation.
        if *seq > 0 || rows.iter().any(|r| r.0 == *id && r.1 > 0) {
            continue;
        }
        let Some(referenced) = tables.get(target) else {
            debug!("Skipping foreign key {table}.{from}: unknown table {target}");
            continue;
        };
        let to = match to {
            Some(to) => to.clone(),
            None => match referenced.primary_key().as_slice() {
                [pk] => pk.to_string(),
                _ => "rowid".to_string(),
            },
        };
        foreign_keys.push(ForeignKey {
            column: from.clone(),
            table: target.clone(),
            to,
        });
    }
    Ok(foreign_keys)
}

fn build_fields(columns: &[Column], foreign_keys: &[ForeignKey]) -> Vec<FieldDef> {
    columns
        .iter()
        .map(|column| {
            let relation = foreign_keys.iter().find(|fk| fk.column == column.name).cloned();
            let name = match &relation {
                Some(_) => relation_name(&column.name, columns),
                None => column.name.clone(),
            };
            FieldDef {
                name,
                column: column.name.clone(),
                decl_type: column.decl_type.clone(),
                relation,
            }
        })
        .collect()
}

/// `author_id` -> `author`, unless that would shadow another column.
fn relation_name(column: &str, columns: &[Column]) -> String {
    match column.strip_suffix("_id") {
        Some(stem) if !stem.is_empty() && !columns.iter().any(|c| c.name == stem) => {
            stem.to_string()
        }
        _ => column.to_string(),
    }
}

/// Quotes an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ---------------------------------------------------------------------------
// SqliteSchema
// ---------------------------------------------------------------------------

/// [`ModelSchema`] view of one table in a [`Catalog`].
#[derive(Debug, Clone)]
pub struct SqliteSchema {
    catalog: Arc<Catalog>,
    table: String,
}

impl SqliteSchema {
    pub fn new(catalog: Arc<Catalog>, table: &str) -> Result<Self> {
        if catalog.table(table).is_none() {
            return Err(ExportError::Collection(format!(
                "no such table: {table}. Tables are: {}",
                catalog.table_names().join(", ")
            )));
        }
        Ok(Self {
            catalog,
            table: table.to_string(),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    fn lookup(&self, name: &str) -> Result<&FieldDef> {
        self.catalog
            .table(&self.table)
            .and_then(|t| t.field(name))
            .ok_or_else(|| ExportError::field_not_found(&self.table, name))
    }
}

impl ModelSchema for SqliteSchema {
    fn model_name(&self) -> &str {
        &self.table
    }

    fn field_names(&self) -> Vec<String> {
        self.catalog
            .table(&self.table)
            .map(Table::field_names)
            .unwrap_or_default()
    }

    fn field(&self, name: &str) -> Result<FieldMeta> {
        let field = self.lookup(name)?;
        Ok(FieldMeta {
            name: field.name.clone(),
            verbose_name: default_verbose_name(&field.name),
            is_relation: field.relation.is_some(),
        })
    }

    fn related_schema(&self, name: &str) -> Result<Arc<dyn ModelSchema>> {
        match &self.lookup(name)?.relation {
            Some(fk) => Ok(Arc::new(SqliteSchema::new(self.catalog.clone(), &fk.table)?)),
            None => Err(ExportError::Collection(format!(
                "{}.{name} is not a relation",
                self.table
            ))),
        }
    }
}
