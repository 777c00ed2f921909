//! Shared helpers for integration tests: a config rooted in a tempdir with
//! dummy assets, driving the simulator bridge with zero settle delay.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use macrodrive::config::{
    AppConfig, FILTER_MACRO_FILE, PROFIT_MACRO_FILE, REFERENCE_WORKBOOK,
};

pub const SIM_BIN: &str = env!("CARGO_BIN_EXE_macrodrive-host-sim");

pub const REFERENCE_BYTES: &[u8] = b"PK\x03\x04 reference workbook stand-in";

/// Build a config under `root` with staged dirs and all three assets
/// present, using the simulator as the bridge.
pub fn sim_config(root: &Path) -> AppConfig {
    let assets = root.join("assets");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join(REFERENCE_WORKBOOK), REFERENCE_BYTES).unwrap();
    std::fs::write(
        assets.join(FILTER_MACRO_FILE),
        "Sub ФильтрацияСтрок()\nEnd Sub\n",
    )
    .unwrap();
    std::fs::write(
        assets.join(PROFIT_MACRO_FILE),
        "Sub ИтогПрибыли()\nEnd Sub\n",
    )
    .unwrap();

    let config = AppConfig {
        staging_dir: root.join("uploads"),
        output_dir: root.join("processed"),
        assets_dir: assets,
        bridge_command: vec![SIM_BIN.to_string()],
        settle_delay: Duration::ZERO,
        ..AppConfig::default()
    };
    config.ensure_dirs().unwrap();
    config
}

/// Same as `sim_config`, with the simulator told to fail at `step`.
pub fn sim_config_failing_at(root: &Path, step: &str) -> AppConfig {
    let mut config = sim_config(root);
    config.bridge_command = vec![
        SIM_BIN.to_string(),
        "--fail-at".to_string(),
        step.to_string(),
    ];
    config
}

pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
