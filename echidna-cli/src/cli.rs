//! CLI argument parsing using clap derive API
//!
//! Purely declarative; flags are applied on top of the loaded configuration
//! by [`Cli::apply_overrides`].

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use echidna_core::EchidnaConfig;

/// Echidna -- scan a plugin registry for vulnerable code patterns.
///
/// Downloads every plugin archive listed by the registry, scans its PHP
/// sources and keeps flagged archives under `<work-dir>/inspect/<MODULE>/`.
#[derive(Parser, Debug)]
#[command(name = "echidna", version, about, long_about = None)]
pub struct Cli {
    /// Path to the echidna.toml configuration file (missing file -> defaults).
    #[arg(short, long, default_value = "echidna.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Directory holding current/ and inspect/.
    #[arg(short, long)]
    pub work_dir: Option<PathBuf>,

    /// Size of the shared download/scan token pool.
    #[arg(short = 'n', long)]
    pub max_in_flight: Option<usize>,

    /// Comma-separated vulnerability modules to enable (e.g. XSS,SQLI).
    #[arg(short, long, value_delimiter = ',')]
    pub modules: Option<Vec<String>>,

    /// Expose Prometheus metrics on the configured listen address.
    #[arg(long)]
    pub metrics: bool,

    /// Final summary format.
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl Cli {
    /// Apply command-line overrides. Flags take precedence over env and file.
    pub fn apply_overrides(&self, config: &mut EchidnaConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(dir) = &self.work_dir {
            config.general.work_dir = dir.clone();
        }
        if let Some(n) = self.max_in_flight {
            config.scanner.max_in_flight = n;
        }
        if let Some(modules) = &self.modules {
            config.scanner.modules = modules
                .iter()
                .map(|m| m.trim().to_ascii_uppercase())
                .filter(|m| !m.is_empty())
                .collect();
        }
        if self.metrics {
            config.metrics.enabled = true;
        }
    }
}
