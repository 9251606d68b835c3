use std::sync::Arc;

use rusqlite::Connection;
use tabula_core::{ComputedField, ExportError, RecordCollection, Value};
use tabula_docs::{ExportOptions, ExportRenderer, parse_csv};
use tabula_sqlite::SqliteSource;

fn library_db(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "
        CREATE TABLE department (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
        CREATE TABLE author (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            department_id INTEGER REFERENCES department(id)
        );
        CREATE TABLE book (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            price REAL,
            author_id INTEGER REFERENCES author(id)
        );
        INSERT INTO department VALUES (1, 'Fiction'), (2, 'Science');
        INSERT INTO author VALUES (1, 'Herbert', 1), (2, 'Sagan', 2);
        INSERT INTO book VALUES
            (1, 'Dune', 9.99, 1),
            (2, 'Cosmos', 12.5, 2),
            (3, 'Pale Blue Dot', NULL, 2);
        ",
    )
    .unwrap();
}

fn open_library() -> (tempfile::TempDir, SqliteSource) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("library.db");
    library_db(&path);
    let source = SqliteSource::open(&path).unwrap();
    (dir, source)
}

// ---------------------------------------------------------------------------
// Field resolution against a table
// ---------------------------------------------------------------------------

#[test]
fn no_field_list_exports_table_columns() {
    let (_dir, source) = open_library();
    let books: Arc<dyn RecordCollection> = Arc::new(source.collection("book").unwrap());
    let renderer = ExportRenderer::default().with_collection(books);

    let setup = renderer.render_setup(&ExportOptions::new()).unwrap();
    assert_eq!(setup.field_names(), vec!["id", "title", "price", "author"]);
    assert_eq!(setup.headers, vec!["Id", "Title", "Price", "Author"]);
}

#[test]
fn declared_field_names_narrow_the_export() {
    let (_dir, source) = open_library();
    let books = source.collection("book").unwrap().with_field_names(&["title"]);
    let renderer = ExportRenderer::default().with_collection(Arc::new(books));

    let response = renderer.render_csv(&ExportOptions::new()).unwrap();
    assert_eq!(
        String::from_utf8(response.into_body()).unwrap(),
        "Title\r\nDune\r\nCosmos\r\nPale Blue Dot\r\n"
    );
}

// ---------------------------------------------------------------------------
// Full renders
// ---------------------------------------------------------------------------

#[test]
fn csv_export_follows_relations() {
    let (_dir, source) = open_library();
    let renderer = ExportRenderer::default()
        .with_collection(Arc::new(source.collection("book").unwrap()))
        .with_computed(
            ComputedField::new("price_label", &["price"], |v| match &v[0] {
                Value::Null => Ok(Value::from("n/a")),
                other => other
                    .as_f64()
                    .map(|p| Value::Text(format!("${p:.2}")))
                    .ok_or_else(|| format!("not a price: {other}")),
            })
            .with_label("Price"),
        );

    let options = ExportOptions::new().fields(&["title", "author__department__name", "price_label"]);
    let response = renderer.render_csv(&options).unwrap();
    let (headers, rows) = parse_csv(std::str::from_utf8(response.body()).unwrap()).unwrap();

    assert_eq!(headers, vec!["Title", "Author Department Name", "Price"]);
    assert_eq!(
        rows,
        vec![
            vec!["Dune", "Fiction", "$9.99"],
            vec!["Cosmos", "Science", "$12.50"],
            vec!["Pale Blue Dot", "Science", "n/a"],
        ]
    );
}

#[test]
fn excel_export_writes_workbook() {
    let (dir, source) = open_library();
    let renderer = ExportRenderer::default()
        .with_collection(Arc::new(source.collection("book").unwrap().order_by(&["-price"])));

    let response = renderer
        .render(&ExportOptions::new().format("excel").filename("books.xlsx"))
        .unwrap();
    assert_eq!(response.filename(), "books.xlsx");

    let out = dir.path().join("books.xlsx");
    response.write_to(&out).unwrap();
    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(&bytes[0..2], b"PK");
}

#[test]
fn unknown_column_surfaces_collection_error() {
    let (_dir, source) = open_library();
    let books: Arc<dyn RecordCollection> = Arc::new(source.collection("book").unwrap());
    let renderer = ExportRenderer::default().with_collection(books);

    // Header generation rejects the path first.
    let err = renderer
        .render_csv(&ExportOptions::new().fields(&["isbn"]))
        .unwrap_err();
    assert!(matches!(err, ExportError::FieldNotFound { .. }));

    // With headers supplied, the fetch itself reports it.
    let err = renderer
        .render_csv(&ExportOptions::new().fields(&["isbn"]).headers(&["ISBN"]))
        .unwrap_err();
    match err {
        ExportError::Collection(msg) => assert!(msg.contains("Choices are: id, title, price, author")),
        other => panic!("unexpected error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Temporal values
// ---------------------------------------------------------------------------

fn events() -> (SqliteSource, ExportRenderer) {
    let mut source = SqliteSource::open_in_memory().unwrap();
    source
        .execute_batch(
            "
            CREATE TABLE event (id INTEGER PRIMARY KEY, born DATE, at DATETIME);
            INSERT INTO event VALUES
                (1, '1850-06-01', '2024-01-02 03:04:05.250'),
                (2, '2024-02-29', '1899-12-31 23:59:59');
            ",
        )
        .unwrap();
    let renderer =
        ExportRenderer::default().with_collection(Arc::new(source.collection("event").unwrap()));
    (source, renderer)
}

#[test]
fn csv_export_keeps_fractional_seconds() {
    let (_source, renderer) = events();
    let response = renderer
        .render_csv(&ExportOptions::new().fields(&["at"]))
        .unwrap();
    assert_eq!(
        String::from_utf8(response.into_body()).unwrap(),
        "At\r\n2024-01-02 03:04:05.250\r\n1899-12-31 23:59:59\r\n"
    );
}

#[test]
fn excel_export_accepts_dates_outside_excel_range() {
    let (_source, renderer) = events();
    let options = ExportOptions::new().fields(&["id", "born", "at"]);

    let csv = renderer.render_csv(&options).unwrap();
    assert!(std::str::from_utf8(csv.body()).unwrap().contains("1,1850-06-01,"));

    let excel = renderer.render_excel(&options).unwrap();
    assert_eq!(&excel.body()[0..2], b"PK");
}
