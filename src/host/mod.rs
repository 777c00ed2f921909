//! The external-collaborator contract for the spreadsheet automation host.
//!
//! The orchestrator only needs a handful of primitives: open/save/close
//! documents with warning-suppression flags, inject a named code module, and
//! invoke a routine by name. `BridgeHost` is the production implementation;
//! tests substitute scripted hosts to exercise failure paths.

pub mod bridge;

pub use bridge::BridgeHost;

use std::path::Path;

use crate::error::DriveResult;
use crate::protocol::{OpenOptions, SaveFormat};

/// Opaque handle to a workbook held open by the host.
pub type WorkbookHandle = u64;

pub trait AutomationHost {
    fn open_workbook(&mut self, path: &Path, options: OpenOptions) -> DriveResult<WorkbookHandle>;

    fn inject_module(
        &mut self,
        workbook: WorkbookHandle,
        name: &str,
        source: &str,
    ) -> DriveResult<()>;

    fn run_macro(&mut self, name: &str) -> DriveResult<()>;

    fn save_workbook(
        &mut self,
        workbook: WorkbookHandle,
        path: &Path,
        format: SaveFormat,
    ) -> DriveResult<()>;

    fn close_workbook(&mut self, workbook: WorkbookHandle, save_changes: bool) -> DriveResult<()>;

    /// Quit the application instance. Must be safe to call after failures.
    fn quit(&mut self) -> DriveResult<()>;
}
