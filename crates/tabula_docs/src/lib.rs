// Export encoding (CSV, XLSX) and response rendering

pub mod csv;
pub mod format;
pub mod renderer;
pub mod response;
pub mod xlsx;

pub use csv::{CsvEncoder, generate_csv, parse_csv};
pub use format::{EncodeSummary, ExportFormat, SheetEncoder};
pub use renderer::{ExportOptions, ExportRenderer, ExportSetup};
pub use response::ExportResponse;
pub use xlsx::XlsxEncoder;
