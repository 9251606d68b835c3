use std::sync::Arc;

use tabula_core::{
    ComputedField, ComputedFields, ExportError, FieldSpec, HeaderRow, ModelSchema,
    RecordCollection, RendererConfig, Result, RowGenerator, TabulaConfig, generate_headers,
    generate_rows, resolve_collection, resolve_fields,
};
use tracing::{debug, info, warn};

use crate::csv::CsvEncoder;
use crate::format::{ExportFormat, SheetEncoder};
use crate::response::ExportResponse;
use crate::xlsx::XlsxEncoder;

// ---------------------------------------------------------------------------
// ExportOptions
// ---------------------------------------------------------------------------

/// Per-call overrides. Anything left `None` falls back to the renderer's defaults.
#[derive(Clone, Default)]
pub struct ExportOptions {
    pub collection: Option<Arc<dyn RecordCollection>>,
    pub fields: Option<Vec<String>>,
    pub headers: Option<Vec<String>>,
    pub filename: Option<String>,
    pub format: Option<String>,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(mut self, collection: Arc<dyn RecordCollection>) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.as_ref().to_string()).collect());
        self
    }

    pub fn headers<S: AsRef<str>>(mut self, headers: &[S]) -> Self {
        self.headers = Some(headers.iter().map(|h| h.as_ref().to_string()).collect());
        self
    }

    pub fn filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.to_string());
        self
    }

    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }
}

// ---------------------------------------------------------------------------
// ExportSetup
// ---------------------------------------------------------------------------

/// Everything resolved for one render, before any record is fetched.
pub struct ExportSetup {
    pub collection: Arc<dyn RecordCollection>,
    pub fields: Vec<FieldSpec>,
    pub headers: HeaderRow,
}

impl ExportSetup {
    /// Starts the bulk fetch. Each call begins a fresh pass over the collection.
    pub fn rows(&self) -> Result<RowGenerator<'_>> {
        generate_rows(self.collection.as_ref(), &self.fields)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name().to_string()).collect()
    }
}

// ---------------------------------------------------------------------------
// ExportRenderer
// ---------------------------------------------------------------------------

/// Turns a record collection into a downloadable CSV or XLSX document.
///
/// Resolves fields, generates rows and headers, then hands both to the
/// encoder for the chosen format. Holds no state between calls.
pub struct ExportRenderer {
    config: RendererConfig,
    collection: Option<Arc<dyn RecordCollection>>,
    model: Option<Arc<dyn ModelSchema>>,
    computed: ComputedFields,
    csv: CsvEncoder,
    xlsx: XlsxEncoder,
}

impl Default for ExportRenderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl ExportRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            collection: None,
            model: None,
            computed: ComputedFields::new(),
            csv: CsvEncoder::new(),
            xlsx: XlsxEncoder::new(),
        }
    }

    /// Builds a renderer from application settings: export defaults plus
    /// encoder options.
    pub fn from_config(config: &TabulaConfig) -> Self {
        let csv = match config.csv_delimiter_byte() {
            Some(delimiter) => CsvEncoder::with_delimiter(delimiter),
            None => {
                warn!(
                    "Ignoring non-ASCII CSV delimiter {:?}, using ','",
                    config.csv_delimiter
                );
                CsvEncoder::new()
            }
        };
        let xlsx = XlsxEncoder::new()
            .with_bold_headers(config.bold_headers)
            .with_autofit(config.autofit_columns);

        Self::new(config.export.clone())
            .with_csv_encoder(csv)
            .with_xlsx_encoder(xlsx)
    }

    /// Default collection, used when a call does not pass one.
    pub fn with_collection(mut self, collection: Arc<dyn RecordCollection>) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Model whose fields are exported when nothing else names any.
    pub fn with_model(mut self, model: Arc<dyn ModelSchema>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_computed(mut self, field: ComputedField) -> Self {
        self.computed.register(field);
        self
    }

    pub fn with_csv_encoder(mut self, encoder: CsvEncoder) -> Self {
        self.csv = encoder;
        self
    }

    pub fn with_xlsx_encoder(mut self, encoder: XlsxEncoder) -> Self {
        self.xlsx = encoder;
        self
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn computed(&self) -> &ComputedFields {
        &self.computed
    }

    /// The call's format, else the configured one. Unknown names are rejected here.
    pub fn get_format(&self, options: &ExportOptions) -> Result<ExportFormat> {
        let format = options
            .format
            .as_deref()
            .or(self.config.format.as_deref())
            .ok_or_else(|| ExportError::Configuration("format is not defined".into()))?;
        format.parse()
    }

    pub fn get_filename(&self, options: &ExportOptions, format: ExportFormat) -> String {
        options
            .filename
            .clone()
            .or_else(|| self.config.filename.clone())
            .unwrap_or_else(|| format!("export.{}", format.extension()))
    }

    pub fn get_fields(&self, options: &ExportOptions) -> Vec<String> {
        let collection = options.collection.as_ref().or(self.collection.as_ref());
        resolve_fields(
            options.fields.as_deref(),
            self.config.fields.as_deref(),
            collection.map(|c| &**c),
            self.model.as_deref(),
        )
    }

    /// Resolves fields, collection and header row without fetching any data.
    pub fn render_setup(&self, options: &ExportOptions) -> Result<ExportSetup> {
        let names = self.get_fields(options);
        let collection = resolve_collection(options.collection.clone(), self.collection.as_ref())?;
        let fields = self.computed.resolve(&names);

        let headers = match options.headers.as_ref().filter(|h| !h.is_empty()) {
            Some(headers) => {
                if !fields.is_empty() && headers.len() != fields.len() {
                    warn!(
                        "Header override has {} labels for {} fields",
                        headers.len(),
                        fields.len()
                    );
                }
                headers.clone()
            }
            None => generate_headers(collection.schema().as_ref(), &fields)?,
        };

        debug!(
            "Export setup: fields [{}], {} header labels",
            names.join(", "),
            headers.len()
        );
        Ok(ExportSetup {
            collection,
            fields,
            headers,
        })
    }

    /// Renders in the call's (or configured) format.
    pub fn render(&self, options: &ExportOptions) -> Result<ExportResponse> {
        let format = self.get_format(options)?;
        self.render_as(format, options)
    }

    pub fn render_csv(&self, options: &ExportOptions) -> Result<ExportResponse> {
        self.render_as(ExportFormat::Csv, options)
    }

    pub fn render_excel(&self, options: &ExportOptions) -> Result<ExportResponse> {
        self.render_as(ExportFormat::Excel, options)
    }

    fn encoder(&self, format: ExportFormat) -> &dyn SheetEncoder {
        match format {
            ExportFormat::Excel => &self.xlsx,
            ExportFormat::Csv => &self.csv,
        }
    }

    fn render_as(&self, format: ExportFormat, options: &ExportOptions) -> Result<ExportResponse> {
        let filename = self.get_filename(options, format);
        let setup = self.render_setup(options)?;
        let mut rows = setup.rows()?;

        let mut body = Vec::new();
        let summary = self
            .encoder(format)
            .encode(&mut rows, Some(&setup.headers), &mut body)?;

        info!(
            "Rendered {} rows as {} to {} ({} bytes)",
            summary.rows,
            format,
            filename,
            body.len()
        );
        Ok(ExportResponse::new(format, filename, body))
    }
}
