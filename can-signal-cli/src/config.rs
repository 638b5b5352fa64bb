//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use can_signal_decoder::DecoderConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub decoding: DecoderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    /// Signal catalog JSON file
    pub catalog: Option<PathBuf>,
    /// Frame log files or glob patterns, read in order
    #[serde(default)]
    pub frame_logs: Vec<String>,
    /// Column delimiter of the frame logs
    #[serde(default = "default_log_delimiter")]
    pub delimiter: char,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            frame_logs: Vec::new(),
            delimiter: default_log_delimiter(),
        }
    }
}

fn default_log_delimiter() -> char {
    ','
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Output file (default: stdout)
    pub path: Option<PathBuf>,
    /// Column delimiter for delimited output
    #[serde(default = "default_output_delimiter")]
    pub delimiter: char,
    /// Number of samples to show in the end-of-run preview
    #[serde(default)]
    pub preview: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            path: None,
            delimiter: default_output_delimiter(),
            preview: 0,
        }
    }
}

fn default_output_delimiter() -> char {
    ';'
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Jsonl,
    /// Delimited text with a header row
    Csv,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

impl AppConfig {
    /// Check the settings a run cannot start without
    pub fn validate(&self) -> Result<()> {
        if self.input.catalog.is_none() {
            bail!("No signal catalog given (use --catalog or [input] catalog)");
        }
        if self.input.frame_logs.is_empty() {
            bail!("No frame logs given (use --log or [input] frame_logs)");
        }
        if self.input.delimiter.is_ascii_hexdigit() {
            bail!("Frame log delimiter {:?} collides with hex data", self.input.delimiter);
        }
        Ok(())
    }
}
