use std::fmt;
use std::io::Write;
use std::str::FromStr;

use tabula_core::{ExportError, Result, Row};

/// The two supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Excel,
    Csv,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excel => "excel",
            Self::Csv => "csv",
        }
    }

    /// File extension used for the default filename.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Excel => "xlsx",
            Self::Csv => "csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Csv => "text/csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "excel" => Ok(Self::Excel),
            "csv" => Ok(Self::Csv),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an encoder wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSummary {
    pub rows: usize,
    pub header_written: bool,
}

/// A sink writer turning a header row and data rows into one output document.
///
/// A failure part-way leaves `sink` partially written; callers discard it.
pub trait SheetEncoder {
    fn format(&self) -> ExportFormat;

    fn encode(
        &self,
        rows: &mut dyn Iterator<Item = Result<Row>>,
        headers: Option<&[String]>,
        sink: &mut dyn Write,
    ) -> Result<EncodeSummary>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_formats() {
        assert_eq!("excel".parse::<ExportFormat>().unwrap(), ExportFormat::Excel);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
    }

    #[test]
    fn test_parse_unknown_format() {
        let err = "pdf".parse::<ExportFormat>().unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedFormat(ref f) if f == "pdf"));
        // Matching is exact.
        assert!("CSV".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_extension_and_content_type() {
        assert_eq!(ExportFormat::Excel.extension(), "xlsx");
        assert_eq!(ExportFormat::Csv.content_type(), "text/csv");
        assert_eq!(ExportFormat::Excel.to_string(), "excel");
    }
}
