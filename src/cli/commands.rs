//! Command implementations shared by the binary entry point.

use std::path::Path;

use crate::config::AppConfig;
use crate::error::{DriveError, DriveResult};
use crate::orchestrator::run_pipeline;

/// Run the macro pipeline once against a local workbook, without HTTP.
///
/// Useful for smoke-testing the bridge and the asset layout on a new
/// deployment.
pub fn process(config: &AppConfig, file: &Path) -> DriveResult<()> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !crate::api::handlers::has_accepted_extension(&name) {
        return Err(DriveError::InvalidExtension(name));
    }
    if !file.exists() {
        return Err(DriveError::MissingAsset(file.to_path_buf()));
    }

    let output = run_pipeline(config, file)?;
    println!("Processed workbook written to {}", output.display());
    Ok(())
}
