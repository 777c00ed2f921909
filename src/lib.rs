//! Macrodrive - HTTP relay for pre-authored spreadsheet macros
//!
//! Accepts an uploaded workbook over HTTP, drives an external spreadsheet
//! automation host (through a JSON-over-stdio bridge process) to run two
//! opaque macros against it with a fixed reference workbook open as lookup
//! data, and streams the processed workbook back.
//!
//! The value of this crate is the orchestration contract: strict sequencing
//! of the host lifecycle with warning suppression at every step and
//! guaranteed teardown of all opened handles on every exit path.
//!
//! # Example
//!
//! ```no_run
//! use macrodrive::config::AppConfig;
//! use macrodrive::orchestrator::run_pipeline;
//! use std::path::Path;
//!
//! let config = AppConfig::default();
//! config.ensure_dirs()?;
//! let output = run_pipeline(&config, Path::new("uploads/report.xlsx"))?;
//! println!("saved: {}", output.display());
//! # Ok::<(), macrodrive::error::DriveError>(())
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod protocol;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{DriveError, DriveResult};
