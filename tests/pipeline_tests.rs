//! End-to-end pipeline tests: run_pipeline through the simulator bridge.

mod common;

use macrodrive::orchestrator::run_pipeline;
use macrodrive::DriveError;
use pretty_assertions::assert_eq;

#[test]
fn test_pipeline_produces_processed_workbook() {
    let tmp = tempfile::tempdir().unwrap();
    let config = common::sim_config(tmp.path());

    let input = config.staging_dir.join("c3f1_report.xlsx");
    std::fs::write(&input, b"uploaded workbook").unwrap();

    let output = run_pipeline(&config, &input).unwrap();

    assert!(output.is_absolute());
    assert_eq!(
        output.file_name().unwrap().to_string_lossy(),
        "processed_c3f1_report.xlsx"
    );
    assert_eq!(std::fs::read(&output).unwrap(), b"uploaded workbook");
    // The pipeline does not own staged-file cleanup; the upload handler does.
    assert!(input.exists());
}

#[test]
fn test_pipeline_never_modifies_the_reference_workbook() {
    let tmp = tempfile::tempdir().unwrap();
    let config = common::sim_config(tmp.path());
    let reference = config.reference_workbook();
    let before = std::fs::read(&reference).unwrap();

    for i in 0..3 {
        let input = config.staging_dir.join(format!("run{i}.xlsx"));
        std::fs::write(&input, b"input").unwrap();
        run_pipeline(&config, &input).unwrap();
    }

    assert_eq!(std::fs::read(&reference).unwrap(), before);
}

#[test]
fn test_pipeline_missing_reference_fails_without_spawning() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = common::sim_config(tmp.path());
    std::fs::remove_file(config.reference_workbook()).unwrap();
    // If the pipeline tried to spawn this, the error kind would differ.
    config.bridge_command = vec!["/no/such/bridge".to_string()];

    let input = config.staging_dir.join("in.xlsx");
    std::fs::write(&input, b"input").unwrap();

    let result = run_pipeline(&config, &input);
    match result {
        Err(DriveError::MissingAsset(path)) => {
            assert_eq!(path, config.reference_workbook());
        }
        other => panic!("expected missing asset, got {other:?}"),
    }
}

#[test]
fn test_pipeline_macro_failure_leaves_no_output() {
    let tmp = tempfile::tempdir().unwrap();
    let config = common::sim_config_failing_at(tmp.path(), "run-macro");

    let input = config.staging_dir.join("in.xlsx");
    std::fs::write(&input, b"input").unwrap();

    let result = run_pipeline(&config, &input);
    assert!(matches!(result, Err(DriveError::Host(_))));
    assert!(common::dir_entries(&config.output_dir).is_empty());
}

#[test]
fn test_pipeline_save_failure_surfaces_after_teardown() {
    let tmp = tempfile::tempdir().unwrap();
    let config = common::sim_config_failing_at(tmp.path(), "save-workbook");

    let input = config.staging_dir.join("in.xlsx");
    std::fs::write(&input, b"input").unwrap();

    let result = run_pipeline(&config, &input);
    match result {
        Err(DriveError::Host(message)) => {
            assert!(message.contains("simulated failure at save-workbook"))
        }
        other => panic!("expected host error, got {other:?}"),
    }
}
