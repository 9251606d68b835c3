use std::io::Write;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet, XlsxError};
use tabula_core::{ExportError, Result, Row, Value};
use tracing::debug;

use crate::format::{EncodeSummary, ExportFormat, SheetEncoder};

const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";
const DATETIME_MILLIS_FORMAT: &str = "yyyy-mm-dd hh:mm:ss.000";

/// Largest magnitude an f64 cell holds without rounding (2^53).
const MAX_EXACT_INT: i64 = 1 << 53;

/// Number formats shared by every cell of a worksheet.
struct CellFormats {
    date: Format,
    datetime: Format,
    datetime_millis: Format,
}

impl CellFormats {
    fn new() -> Self {
        Self {
            date: Format::new().set_num_format(DATE_FORMAT),
            datetime: Format::new().set_num_format(DATETIME_FORMAT),
            datetime_millis: Format::new().set_num_format(DATETIME_MILLIS_FORMAT),
        }
    }
}

/// Spreadsheet encoder writing a single worksheet.
///
/// Headers, when given, go in row 0 and push the data down by one row.
#[derive(Debug, Clone, Copy)]
pub struct XlsxEncoder {
    bold_headers: bool,
    autofit: bool,
}

impl Default for XlsxEncoder {
    fn default() -> Self {
        Self {
            bold_headers: true,
            autofit: true,
        }
    }
}

impl XlsxEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bold_headers(mut self, bold: bool) -> Self {
        self.bold_headers = bold;
        self
    }

    pub fn with_autofit(mut self, autofit: bool) -> Self {
        self.autofit = autofit;
        self
    }

    /// Builds the workbook in memory. Returns it with the number of data rows written.
    pub fn build_workbook(
        &self,
        rows: &mut dyn Iterator<Item = Result<Row>>,
        headers: Option<&[String]>,
    ) -> Result<(Workbook, usize)> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        let header_format = if self.bold_headers {
            Format::new().set_bold()
        } else {
            Format::new()
        };
        let formats = CellFormats::new();

        // Write header row
        let mut row_offset = 0;
        if let Some(headers) = headers.filter(|h| !h.is_empty()) {
            row_offset = 1;
            for (col, header) in headers.iter().enumerate() {
                let col = column_index(col)?;
                worksheet
                    .write_string_with_format(0, col, header.as_str(), &header_format)
                    .map_err(|e| xlsx_error(&format!("Failed to write header at column {col}"), e))?;
            }
        }

        // Write data rows
        let mut count = 0;
        for (row_idx, row) in rows.enumerate() {
            let row = row?;
            let excel_row = u32::try_from(row_idx + row_offset)
                .map_err(|_| ExportError::Encoding(format!("Row {row_idx} is out of range")))?;
            for (col_idx, value) in row.iter().enumerate() {
                let col = column_index(col_idx)?;
                write_cell(worksheet, excel_row, col, value, &formats)
                    .map_err(|e| {
                        xlsx_error(&format!("Failed to write cell at ({excel_row}, {col})"), e)
                    })?;
            }
            count += 1;
        }

        if self.autofit {
            worksheet.autofit();
        }

        debug!("Built worksheet with {count} data rows");
        Ok((workbook, count))
    }
}

impl SheetEncoder for XlsxEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Excel
    }

    fn encode(
        &self,
        rows: &mut dyn Iterator<Item = Result<Row>>,
        headers: Option<&[String]>,
        sink: &mut dyn Write,
    ) -> Result<EncodeSummary> {
        let header_written = headers.is_some_and(|h| !h.is_empty());
        let (mut workbook, count) = self.build_workbook(rows, headers)?;

        let bytes = workbook
            .save_to_buffer()
            .map_err(|e| xlsx_error("Failed to save workbook to buffer", e))?;
        sink.write_all(&bytes)?;
        sink.flush()?;

        Ok(EncodeSummary {
            rows: count,
            header_written,
        })
    }
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    formats: &CellFormats,
) -> std::result::Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Value::Int(i) if i.unsigned_abs() <= MAX_EXACT_INT.unsigned_abs() => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        Value::Int(i) => {
            worksheet.write_string(row, col, i.to_string())?;
        }
        Value::Float(x) => {
            worksheet.write_number(row, col, *x)?;
        }
        Value::Text(s) => {
            worksheet.write_string(row, col, s.as_str())?;
        }
        Value::Date(d) => match excel_date(d) {
            Ok(date) => {
                worksheet.write_datetime_with_format(row, col, &date, &formats.date)?;
            }
            // Outside 1900-9999: keep the ISO text.
            Err(_) => {
                worksheet.write_string(row, col, value.to_string())?;
            }
        },
        Value::DateTime(dt) => {
            let format = if dt.nanosecond() == 0 {
                &formats.datetime
            } else {
                &formats.datetime_millis
            };
            match excel_datetime(dt) {
                Ok(datetime) => {
                    worksheet.write_datetime_with_format(row, col, &datetime, format)?;
                }
                Err(_) => {
                    worksheet.write_string(row, col, value.to_string())?;
                }
            }
        }
    }
    Ok(())
}

fn excel_date(d: &NaiveDate) -> std::result::Result<ExcelDateTime, XlsxError> {
    // Years outside u16 are outside Excel's range too; let from_ymd reject them.
    let year = u16::try_from(d.year()).unwrap_or(0);
    ExcelDateTime::from_ymd(year, d.month() as u8, d.day() as u8)
}

fn excel_datetime(dt: &NaiveDateTime) -> std::result::Result<ExcelDateTime, XlsxError> {
    // Excel resolves to the millisecond; a leap second (nanos >= 1e9) is rejected.
    let millis = u16::try_from(dt.nanosecond() / 1_000_000).unwrap_or(u16::MAX);
    excel_date(&dt.date())?.and_hms_milli(
        dt.hour() as u16,
        dt.minute() as u8,
        dt.second() as u8,
        millis,
    )
}

fn column_index(col: usize) -> Result<u16> {
    u16::try_from(col).map_err(|_| ExportError::Encoding(format!("Column {col} is out of range")))
}

fn xlsx_error(context: &str, e: XlsxError) -> ExportError {
    ExportError::Encoding(format!("{context}: {e}"))
}
