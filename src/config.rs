//! Filesystem and bridge configuration.
//!
//! The reference workbook and the two macro source files are fixed assets
//! located in `assets_dir` (by default next to the running binary). They are
//! opaque inputs: the macros' row-filtering and profit-aggregation logic is
//! authored elsewhere and only ever invoked by name.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed lookup workbook the macros consult; opened read-only every run.
pub const REFERENCE_WORKBOOK: &str = "Файл с закупками.xlsx";

/// Source text of the row-filtering macro.
pub const FILTER_MACRO_FILE: &str = "Фильтрация строк.txt";

/// Source text of the profit-aggregation macro.
pub const PROFIT_MACRO_FILE: &str = "ИтогПрибыли_2.txt";

/// Runtime configuration shared by the HTTP handlers and the orchestrator.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Where uploads are staged before processing; files here are ephemeral.
    pub staging_dir: PathBuf,
    /// Where processed workbooks are written; files here are retained.
    pub output_dir: PathBuf,
    /// Directory holding the reference workbook and macro sources.
    pub assets_dir: PathBuf,
    /// Program + arguments used to spawn the automation bridge process.
    pub bridge_command: Vec<String>,
    /// Wait inserted after automation calls; see `Orchestrator::settle`.
    pub settle_delay: Duration,
    /// Origins allowed by CORS, with credentials.
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("processed"),
            assets_dir: exe_dir(),
            bridge_command: default_bridge_command(),
            settle_delay: Duration::from_secs(1),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://176.123.163.173".to_string(),
                "http://176.123.163.173:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    pub fn reference_workbook(&self) -> PathBuf {
        self.assets_dir.join(REFERENCE_WORKBOOK)
    }

    pub fn filter_macro_file(&self) -> PathBuf {
        self.assets_dir.join(FILTER_MACRO_FILE)
    }

    pub fn profit_macro_file(&self) -> PathBuf {
        self.assets_dir.join(PROFIT_MACRO_FILE)
    }

    /// Create the staging and output directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.staging_dir)?;
        std::fs::create_dir_all(&self.output_dir)
    }

    /// Output path for a staged input: `processed_<staged basename>` inside
    /// the output directory.
    pub fn output_path_for(&self, staged_input: &Path) -> PathBuf {
        let name = staged_input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.output_dir.join(format!("processed_{name}"))
    }
}

fn exe_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Locate the bridge next to the current executable. Production deployments
/// ship the Windows COM bridge and run it under WINE; when it is absent the
/// simulator binary built alongside macrodrive is used so local development
/// works without a spreadsheet application.
fn default_bridge_command() -> Vec<String> {
    let dir = exe_dir();

    let com_bridge = dir.join("excel-macro-bridge.exe");
    if com_bridge.exists() {
        return vec!["wine".to_string(), com_bridge.display().to_string()];
    }

    vec![dir.join("macrodrive-host-sim").display().to_string()]
}
