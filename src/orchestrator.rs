//! Sequencing of one macro run against the automation host.
//!
//! The run is strictly sequential: open the reference workbook, open the
//! uploaded workbook, inject the macro sources as a temporary module, run
//! the warning-suppression routine and the two business macros, save under a
//! new name, then tear everything down. Teardown happens on every exit path
//! and never raises past this module.

use std::env;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{DriveError, DriveResult};
use crate::host::{AutomationHost, BridgeHost, WorkbookHandle};
use crate::protocol::{OpenOptions, SaveFormat};

/// Synthesized routine run before the business macros and again before the
/// save, since document-level settings can re-enable dialogs mid-run.
pub const WARNING_SUPPRESSION_MACRO: &str = "DisableAllWarnings";

/// Row-filtering routine; must be defined inside the injected source.
pub const FILTER_MACRO: &str = "ФильтрацияСтрок";

/// Profit-aggregation routine; must be defined inside the injected source.
pub const PROFIT_MACRO: &str = "ИтогПрибыли";

/// Name of the temporary code module added to the input workbook.
pub const MACRO_MODULE: &str = "TempMacros";

const DISABLE_WARNINGS_SOURCE: &str = r#"
Sub DisableAllWarnings()
    On Error Resume Next
    Application.DisplayAlerts = False
    Application.AlertBeforeOverwriting = False
    ActiveWorkbook.RemovePersonalInformation = True
    Application.AutomationSecurity = 1
    Application.AskToUpdateLinks = False
    ThisWorkbook.RemoveDocumentInformation (1)  ' xlRDIDocumentProperties
End Sub
"#;

/// Run the full pipeline against a staged input file and return the absolute
/// path of the processed workbook.
///
/// The reference workbook is checked before any process is spawned, so a
/// missing asset never launches the host.
pub fn run_pipeline(config: &AppConfig, input: &Path) -> DriveResult<PathBuf> {
    let reference = config.reference_workbook();
    if !reference.exists() {
        return Err(DriveError::MissingAsset(reference));
    }

    let host = BridgeHost::spawn(&config.bridge_command)?;
    Orchestrator::new(host, config.settle_delay).run(config, input)
}

/// Workbooks opened so far; consumed by teardown.
#[derive(Default)]
struct Session {
    reference: Option<WorkbookHandle>,
    input: Option<WorkbookHandle>,
}

pub struct Orchestrator<H: AutomationHost> {
    host: H,
    settle_delay: Duration,
}

impl<H: AutomationHost> Orchestrator<H> {
    pub fn new(host: H, settle_delay: Duration) -> Self {
        Self { host, settle_delay }
    }

    /// Drive the host through the macro run, tearing down all opened
    /// handles afterward whether or not any step failed.
    pub fn run(mut self, config: &AppConfig, input: &Path) -> DriveResult<PathBuf> {
        let mut session = Session::default();
        let outcome = self.drive(config, input, &mut session);
        if let Err(e) = &outcome {
            tracing::error!(error = %e, input = %input.display(), "macro run failed");
        }
        self.teardown(session);
        outcome
    }

    fn drive(
        &mut self,
        config: &AppConfig,
        input: &Path,
        session: &mut Session,
    ) -> DriveResult<PathBuf> {
        info!(input = %input.display(), "processing workbook");

        let reference = self
            .host
            .open_workbook(&config.reference_workbook(), OpenOptions::read_only())?;
        session.reference = Some(reference);
        self.settle();

        let workbook = self.host.open_workbook(input, OpenOptions::read_write())?;
        session.input = Some(workbook);
        self.settle();

        let source = load_macro_source(config)?;
        self.host.inject_module(workbook, MACRO_MODULE, &source)?;
        self.settle();

        self.host.run_macro(WARNING_SUPPRESSION_MACRO)?;
        self.settle();
        self.host.run_macro(FILTER_MACRO)?;
        self.settle();
        self.host.run_macro(PROFIT_MACRO)?;
        self.settle();

        // Suppress once more right before saving.
        self.host.run_macro(WARNING_SUPPRESSION_MACRO)?;

        let output = absolute(config.output_path_for(input))?;
        self.host
            .save_workbook(workbook, &output, SaveFormat::OpenXmlWorkbook)?;
        info!(output = %output.display(), "workbook saved");

        Ok(output)
    }

    /// Close both workbooks and quit the host. Each step is individually
    /// guarded: a failure closing one resource never prevents closing the
    /// others, and nothing here propagates to the caller.
    fn teardown(&mut self, session: Session) {
        if let Some(workbook) = session.input {
            if let Err(e) = self.host.close_workbook(workbook, false) {
                warn!(error = %e, "failed to close input workbook");
            }
        }
        if let Some(workbook) = session.reference {
            if let Err(e) = self.host.close_workbook(workbook, false) {
                warn!(error = %e, "failed to close reference workbook");
            }
        }
        if let Err(e) = self.host.quit() {
            warn!(error = %e, "failed to quit automation host");
        }
    }

    /// The host completes open/run calls asynchronously and offers no way to
    /// await them, so a fixed wall-clock wait is inserted after each call.
    /// Kept in one place; set the delay to zero if the host ever fixes this.
    fn settle(&self) {
        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }
    }
}

/// Concatenate the suppression routine with both macro sources, in the order
/// their routines are invoked.
fn load_macro_source(config: &AppConfig) -> DriveResult<String> {
    let filter = read_asset(&config.filter_macro_file())?;
    let profit = read_asset(&config.profit_macro_file())?;
    Ok(format!("{DISABLE_WARNINGS_SOURCE}\n{filter}\n{profit}"))
}

fn read_asset(path: &Path) -> DriveResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DriveError::MissingAsset(path.to_path_buf())
        } else {
            DriveError::Io(e)
        }
    })
}

fn absolute(path: PathBuf) -> DriveResult<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Host double that records every call and can fail at a chosen step.
    struct ScriptedHost {
        calls: Rc<RefCell<Vec<String>>>,
        fail_at: Option<String>,
        next_handle: WorkbookHandle,
    }

    impl ScriptedHost {
        fn new(calls: Rc<RefCell<Vec<String>>>, fail_at: Option<&str>) -> Self {
            Self {
                calls,
                fail_at: fail_at.map(str::to_string),
                next_handle: 1,
            }
        }

        fn record(&mut self, call: String) -> DriveResult<()> {
            let fails = self
                .fail_at
                .as_deref()
                .is_some_and(|f| call.starts_with(f));
            self.calls.borrow_mut().push(call);
            if fails {
                Err(DriveError::Host("scripted failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl AutomationHost for ScriptedHost {
        fn open_workbook(
            &mut self,
            path: &Path,
            options: OpenOptions,
        ) -> DriveResult<WorkbookHandle> {
            let mode = if options.read_only { "ro" } else { "rw" };
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            self.record(format!("open:{name}:{mode}"))?;
            let handle = self.next_handle;
            self.next_handle += 1;
            Ok(handle)
        }

        fn inject_module(
            &mut self,
            workbook: WorkbookHandle,
            name: &str,
            source: &str,
        ) -> DriveResult<()> {
            assert!(source.contains("Sub DisableAllWarnings()"));
            self.record(format!("inject:{workbook}:{name}"))
        }

        fn run_macro(&mut self, name: &str) -> DriveResult<()> {
            self.record(format!("run:{name}"))
        }

        fn save_workbook(
            &mut self,
            workbook: WorkbookHandle,
            path: &Path,
            format: SaveFormat,
        ) -> DriveResult<()> {
            assert_eq!(format, SaveFormat::OpenXmlWorkbook);
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            self.record(format!("save:{workbook}:{name}"))
        }

        fn close_workbook(
            &mut self,
            workbook: WorkbookHandle,
            save_changes: bool,
        ) -> DriveResult<()> {
            assert!(!save_changes);
            self.record(format!("close:{workbook}"))
        }

        fn quit(&mut self) -> DriveResult<()> {
            self.record("quit".to_string())
        }
    }

    /// Config rooted in a tempdir with dummy assets on disk.
    fn test_config(tmp: &tempfile::TempDir) -> AppConfig {
        let assets = tmp.path().join("assets");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(assets.join(crate::config::REFERENCE_WORKBOOK), b"ref").unwrap();
        std::fs::write(
            assets.join(crate::config::FILTER_MACRO_FILE),
            "Sub ФильтрацияСтрок()\nEnd Sub\n",
        )
        .unwrap();
        std::fs::write(
            assets.join(crate::config::PROFIT_MACRO_FILE),
            "Sub ИтогПрибыли()\nEnd Sub\n",
        )
        .unwrap();

        let config = AppConfig {
            staging_dir: tmp.path().join("uploads"),
            output_dir: tmp.path().join("processed"),
            assets_dir: assets,
            settle_delay: Duration::ZERO,
            ..AppConfig::default()
        };
        config.ensure_dirs().unwrap();
        config
    }

    fn run_with(fail_at: Option<&str>) -> (DriveResult<PathBuf>, Vec<String>) {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(&tmp);
        let input = config.staging_dir.join("abc_report.xlsx");
        std::fs::write(&input, b"input").unwrap();

        let calls = Rc::new(RefCell::new(Vec::new()));
        let host = ScriptedHost::new(Rc::clone(&calls), fail_at);
        let result = Orchestrator::new(host, Duration::ZERO).run(&config, &input);
        let calls = calls.borrow().clone();
        (result, calls)
    }

    #[test]
    fn successful_run_follows_fixed_sequence() {
        let (result, calls) = run_with(None);

        let output = result.unwrap();
        assert!(output.is_absolute());
        assert_eq!(
            output.file_name().unwrap().to_string_lossy(),
            "processed_abc_report.xlsx"
        );
        assert_eq!(
            calls,
            vec![
                format!("open:{}:ro", crate::config::REFERENCE_WORKBOOK),
                "open:abc_report.xlsx:rw".to_string(),
                "inject:2:TempMacros".to_string(),
                "run:DisableAllWarnings".to_string(),
                "run:ФильтрацияСтрок".to_string(),
                "run:ИтогПрибыли".to_string(),
                "run:DisableAllWarnings".to_string(),
                "save:2:processed_abc_report.xlsx".to_string(),
                "close:2".to_string(),
                "close:1".to_string(),
                "quit".to_string(),
            ]
        );
    }

    #[test]
    fn failure_opening_reference_still_quits() {
        let (result, calls) = run_with(Some("open:"));

        assert!(matches!(result, Err(DriveError::Host(_))));
        // Nothing was opened, so teardown only quits.
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], "quit");
    }

    #[test]
    fn failure_opening_input_closes_reference_and_quits() {
        let (result, calls) = run_with(Some("open:abc_report.xlsx"));

        assert!(result.is_err());
        assert_eq!(
            &calls[calls.len() - 2..],
            &["close:1".to_string(), "quit".to_string()]
        );
    }

    #[test]
    fn failure_injecting_module_closes_both_and_quits() {
        let (result, calls) = run_with(Some("inject:"));

        assert!(result.is_err());
        assert_eq!(
            &calls[calls.len() - 3..],
            &[
                "close:2".to_string(),
                "close:1".to_string(),
                "quit".to_string()
            ]
        );
    }

    #[test]
    fn failure_running_business_macro_closes_both_and_quits() {
        let (result, calls) = run_with(Some("run:ФильтрацияСтрок"));

        assert!(result.is_err());
        assert!(!calls.contains(&"run:ИтогПрибыли".to_string()));
        assert_eq!(
            &calls[calls.len() - 3..],
            &[
                "close:2".to_string(),
                "close:1".to_string(),
                "quit".to_string()
            ]
        );
    }

    #[test]
    fn failure_saving_closes_both_and_quits() {
        let (result, calls) = run_with(Some("save:"));

        assert!(result.is_err());
        assert_eq!(
            &calls[calls.len() - 3..],
            &[
                "close:2".to_string(),
                "close:1".to_string(),
                "quit".to_string()
            ]
        );
    }

    #[test]
    fn teardown_failures_do_not_mask_success() {
        // Closing fails, but the save already happened; the run result is
        // still the output path.
        let (result, calls) = run_with(Some("close:"));

        assert!(result.is_ok());
        assert_eq!(calls.last().unwrap(), "quit");
    }

    #[test]
    fn missing_macro_source_is_reported_as_missing_asset() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(&tmp);
        std::fs::remove_file(config.profit_macro_file()).unwrap();
        let input = config.staging_dir.join("in.xlsx");
        std::fs::write(&input, b"input").unwrap();

        let calls = Rc::new(RefCell::new(Vec::new()));
        let host = ScriptedHost::new(Rc::clone(&calls), None);
        let result = Orchestrator::new(host, Duration::ZERO).run(&config, &input);

        assert!(matches!(result, Err(DriveError::MissingAsset(_))));
        assert_eq!(calls.borrow().last().unwrap(), "quit");
    }

    #[test]
    fn missing_reference_fails_before_any_spawn() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = test_config(&tmp);
        std::fs::remove_file(config.reference_workbook()).unwrap();
        // A command that would fail loudly if run_pipeline ever spawned it.
        config.bridge_command = vec![tmp.path().join("no-such-bridge").display().to_string()];

        let input = config.staging_dir.join("in.xlsx");
        std::fs::write(&input, b"input").unwrap();

        let result = run_pipeline(&config, &input);
        assert!(matches!(result, Err(DriveError::MissingAsset(_))));
    }
}
