//! Subprocess management and JSON IPC for the automation bridge process.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::error::{DriveError, DriveResult};
use crate::host::{AutomationHost, WorkbookHandle};
use crate::protocol::{
    Command as BridgeCommand, OpenOptions, Request, Response, ResponseData, ResponseResult,
    SaveFormat,
};

/// Handle to a spawned bridge process. One instance per orchestration run;
/// never shared across requests.
#[derive(Debug)]
pub struct BridgeHost {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl BridgeHost {
    /// Spawn the bridge and initialize the hidden application instance.
    ///
    /// `command` is the program followed by its arguments. The bridge's
    /// stderr is inherited so its diagnostics land in our logs.
    pub fn spawn(command: &[String]) -> DriveResult<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| DriveError::Spawn("bridge command is empty".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DriveError::Spawn(format!("bridge executable not found: {program}"))
                } else {
                    DriveError::Spawn(e.to_string())
                }
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriveError::Spawn("bridge stdin was not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriveError::Spawn("bridge stdout was not piped".to_string()))?;

        let mut host = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 1,
        };

        tracing::info!(bridge = %program, "launching automation host");
        host.send_command(BridgeCommand::Init)?;

        Ok(host)
    }

    /// Send a command to the bridge and wait for the matching response.
    fn send_command(&mut self, command: BridgeCommand) -> DriveResult<Option<ResponseData>> {
        let id = self.next_id;
        self.next_id += 1;

        let request = Request { id, command };
        let json = serde_json::to_string(&request)?;

        writeln!(self.stdin, "{json}")
            .and_then(|_| self.stdin.flush())
            .map_err(|e| DriveError::Protocol(format!("failed to send command: {e}")))?;

        let mut line = String::new();
        self.stdout
            .read_line(&mut line)
            .map_err(|e| DriveError::Protocol(format!("failed to read response: {e}")))?;

        if line.is_empty() {
            return Err(DriveError::Protocol(
                "bridge closed the connection".to_string(),
            ));
        }

        let response: Response = serde_json::from_str(&line)?;
        if response.id != id {
            return Err(DriveError::Protocol(format!(
                "response id {} does not match request id {id}",
                response.id
            )));
        }

        match response.result {
            ResponseResult::Ok { data } => Ok(data),
            ResponseResult::Error { message } => Err(DriveError::Host(message)),
        }
    }
}

impl AutomationHost for BridgeHost {
    fn open_workbook(&mut self, path: &Path, options: OpenOptions) -> DriveResult<WorkbookHandle> {
        let data = self.send_command(BridgeCommand::OpenWorkbook {
            path: path.display().to_string(),
            options,
        })?;
        match data {
            Some(ResponseData::WorkbookHandle { workbook }) => Ok(workbook),
            _ => Err(DriveError::Protocol(
                "open-workbook returned no handle".to_string(),
            )),
        }
    }

    fn inject_module(
        &mut self,
        workbook: WorkbookHandle,
        name: &str,
        source: &str,
    ) -> DriveResult<()> {
        self.send_command(BridgeCommand::InjectModule {
            workbook,
            name: name.to_string(),
            source: source.to_string(),
        })?;
        Ok(())
    }

    fn run_macro(&mut self, name: &str) -> DriveResult<()> {
        self.send_command(BridgeCommand::RunMacro {
            name: name.to_string(),
        })?;
        Ok(())
    }

    fn save_workbook(
        &mut self,
        workbook: WorkbookHandle,
        path: &Path,
        format: SaveFormat,
    ) -> DriveResult<()> {
        self.send_command(BridgeCommand::SaveWorkbook {
            workbook,
            path: path.display().to_string(),
            format,
        })?;
        Ok(())
    }

    fn close_workbook(&mut self, workbook: WorkbookHandle, save_changes: bool) -> DriveResult<()> {
        self.send_command(BridgeCommand::CloseWorkbook {
            workbook,
            save_changes,
        })?;
        Ok(())
    }

    fn quit(&mut self) -> DriveResult<()> {
        self.send_command(BridgeCommand::Quit)?;
        self.child
            .wait()
            .map_err(|e| DriveError::Protocol(format!("failed to reap bridge process: {e}")))?;
        Ok(())
    }
}

impl Drop for BridgeHost {
    /// Last line of defense: if the bridge was not shut down cleanly, kill
    /// the child so no application instance outlives the request.
    fn drop(&mut self) {
        match self.child.try_wait() {
            Ok(Some(_)) => {}
            _ => {
                tracing::warn!("bridge still running on drop, killing it");
                let _ = self.child.kill();
                let _ = self.child.wait();
            }
        }
    }
}
