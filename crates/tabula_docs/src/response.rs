use std::path::Path;

use anyhow::Context;

use crate::format::ExportFormat;

/// A finished export: encoded bytes plus what a client needs to save them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResponse {
    format: ExportFormat,
    filename: String,
    body: Vec<u8>,
}

impl ExportResponse {
    pub fn new(format: ExportFormat, filename: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            format,
            filename: filename.into(),
            body,
        }
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// `attachment; filename="<name>"`
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Saves the body to `path`, creating parent directories as needed.
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, &self.body)
            .with_context(|| format!("Failed to write export to {}", path.display()))?;
        Ok(())
    }
}
