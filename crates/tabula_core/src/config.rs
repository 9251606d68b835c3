use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

// ---------------------------------------------------------------------------
// RendererConfig
// ---------------------------------------------------------------------------

/// Defaults a renderer falls back to when a render call leaves an option out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Fields to export. Ignored when empty.
    pub fields: Option<Vec<String>>,
    /// Attachment filename, used verbatim.
    pub filename: Option<String>,
    /// `csv` or `excel`.
    pub format: Option<String>,
}

// ---------------------------------------------------------------------------
// TabulaConfig
// ---------------------------------------------------------------------------

/// Application configuration stored at `~/.tabula/config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabulaConfig {
    pub export: RendererConfig,

    // Spreadsheet output
    pub bold_headers: bool,
    pub autofit_columns: bool,

    // Delimited text output
    pub csv_delimiter: char,

    // General
    pub log_level: String,
}

impl Default for TabulaConfig {
    fn default() -> Self {
        Self {
            export: RendererConfig::default(),
            bold_headers: true,
            autofit_columns: true,
            csv_delimiter: ',',
            log_level: "info".into(),
        }
    }
}

impl TabulaConfig {
    /// Returns the base config directory: `~/.tabula/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".tabula"))
    }

    /// Returns the config file path: `~/.tabula/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.tabula/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Ensures all required directories exist.
    pub fn ensure_dirs() -> Result<()> {
        for dir in [Self::base_dir()?, Self::logs_dir()?] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Loads config from `~/.tabula/config.json`, or creates the default if missing.
    pub fn load() -> Result<Self> {
        Self::ensure_dirs()?;
        let path = Self::config_path()?;
        Self::load_from_path(&path)
    }

    /// Load config from a specific file path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            info!("Created default config at {}", path.display());
            Ok(config)
        }
    }

    /// Save config to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// The delimiter as a single byte, or `None` for non-ASCII characters.
    pub fn csv_delimiter_byte(&self) -> Option<u8> {
        u8::try_from(self.csv_delimiter).ok().filter(u8::is_ascii)
    }
}
