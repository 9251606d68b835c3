use std::io::Write;

use anyhow::Context;
use tabula_core::{ExportError, Result, Row, Value};
use tracing::debug;

use crate::format::{EncodeSummary, ExportFormat, SheetEncoder};

/// Delimited-text encoder.
///
/// Each field is converted to UTF-8 text and quoted/escaped by the `csv`
/// crate only when needed. Records end with CRLF, as spreadsheet tools expect.
#[derive(Debug, Clone, Copy)]
pub struct CsvEncoder {
    delimiter: u8,
}

impl Default for CsvEncoder {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }
}

impl SheetEncoder for CsvEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn encode(
        &self,
        rows: &mut dyn Iterator<Item = Result<Row>>,
        headers: Option<&[String]>,
        sink: &mut dyn Write,
    ) -> Result<EncodeSummary> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .terminator(csv::Terminator::CRLF)
            .flexible(true)
            .from_writer(sink);

        let header_written = match headers {
            Some(headers) if !headers.is_empty() => {
                writer.write_record(headers).map_err(|e| {
                    ExportError::Encoding(format!("Failed to write header record: {e}"))
                })?;
                true
            }
            _ => false,
        };

        let mut summary = EncodeSummary {
            rows: 0,
            header_written,
        };
        for row in rows {
            let record: Vec<String> = row?.iter().map(Value::to_string).collect();
            writer.write_record(&record).map_err(|e| {
                ExportError::Encoding(format!("Failed to write record {}: {e}", summary.rows + 1))
            })?;
            summary.rows += 1;
        }
        writer.flush()?;

        debug!("Wrote {} CSV records", summary.rows);
        Ok(summary)
    }
}

/// Encode headers and rows into a CSV string.
pub fn generate_csv(headers: Option<&[String]>, rows: &[Row]) -> Result<String> {
    let mut buf = Vec::new();
    let mut iter = rows.iter().cloned().map(Ok::<Row, ExportError>);
    CsvEncoder::new().encode(&mut iter, headers, &mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| ExportError::Encoding(format!("CSV output contained invalid UTF-8: {e}")))
}

/// Reads delimited text back as its header labels and text cells.
///
/// The first record is the header row; ragged records are accepted.
pub fn parse_csv(input: &str) -> anyhow::Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(input.as_bytes());

    let headers = reader
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(str::to_owned)
        .collect();
    let rows = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_owned).collect()))
        .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()
        .context("Failed to read CSV data record")?;

    Ok((headers, rows))
}
