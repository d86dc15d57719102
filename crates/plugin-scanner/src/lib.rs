#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`PluginScannerError`)
//! - [`config`]: Scanner configuration (`PluginScannerConfig`, builder)
//! - [`registry`]: Registry records, paginator, pending plugin set (`PluginRecord`, `RegistryPaginator`, `PluginSet`)
//! - [`fetcher`]: Shared HTTP client with reset-triggered refresh (`HttpFetcher`)
//! - [`vuln`]: Vulnerability modules (`VulnModule` trait, `SignatureModule`, `ModuleRegistry`)
//! - [`archive`]: Zip archive scanning (`ArchiveScanner`)
//! - [`inspect`]: Work directory and inspection store (`WorkDir`, `InspectionStore`)
//! - [`aggregator`]: Run counters and findings (`ResultAggregator`)
//! - [`scheduler`]: Token-pool work loop (`Scheduler`, `PipelineContext`)
//! - [`download`]: Per-plugin download/scan task
//! - [`cleanup`]: Interrupt handling and staging cleanup (`CleanupController`)
//! - [`scanner`]: Main orchestrator (`PluginScanner`, `PluginScannerBuilder`, `ScanTarget` impl)
//!
//! # Architecture
//!
//! ```text
//! registry page 1 --> PluginSet <-- registry pages 2..=N
//!                         |
//!                  Scheduler (max_in_flight tokens)
//!                         |
//!        download --> ArchiveScanner --> XSS / SQLI / CMDEXEC / LFI
//!                         |
//!        clean: delete    |    flagged: inspect/<MODULE>/<file> + <file>.txt
//!                         |
//!                  ResultAggregator --> StatusSnapshot
//! ```

pub mod aggregator;
pub mod archive;
pub mod cleanup;
pub mod config;
pub mod download;
pub mod error;
pub mod fetcher;
pub mod inspect;
pub mod registry;
pub mod scanner;
pub mod scheduler;
pub mod vuln;

// --- Public API Re-exports ---

// Scanner (main orchestrator)
pub use scanner::{PluginScanner, PluginScannerBuilder};

// Configuration
pub use config::{PluginScannerConfig, PluginScannerConfigBuilder};

// Error
pub use error::PluginScannerError;

// Registry
pub use registry::{
    LastPick, PickPolicy, PluginRecord, PluginSet, RandomPick, RegistryInfo, RegistryPage,
    RegistryPaginator,
};

// Pipeline pieces
pub use aggregator::{ResultAggregator, RunCounters};
pub use archive::ArchiveScanner;
pub use cleanup::{CleanupController, CleanupReport, CleanupState};
pub use download::Outcome;
pub use fetcher::HttpFetcher;
pub use inspect::{InspectionStore, Persisted, WorkDir};

// Vulnerability modules
pub use vuln::{Finding, ModuleFindings, ModuleRegistry, ScanResult, SignatureModule, VulnModule};
