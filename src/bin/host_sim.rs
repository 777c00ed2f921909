//! Simulator bridge - speaks the macrodrive automation protocol over
//! stdin/stdout without a real spreadsheet application.
//!
//! `SaveWorkbook` copies the opened workbook's bytes to the destination;
//! module injection and macro runs are accepted and recorded but have no
//! effect. Used for local development where no spreadsheet application is
//! installed, and by the integration tests (`--fail-at` injects an error at
//! a chosen command to exercise teardown paths).
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! - Reads `Request` objects from stdin
//! - Writes `Response` objects to stdout
//! - Diagnostic messages go to stderr (never stdout)

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use macrodrive::protocol::{Command, Request, Response, ResponseData, ResponseResult};

#[derive(Parser)]
#[command(name = "macrodrive-host-sim")]
#[command(about = "Protocol-complete simulator for the macrodrive automation bridge")]
#[command(version)]
struct Args {
    /// Respond with an error to this command (e.g. "open-workbook",
    /// "inject-module", "run-macro", "save-workbook", "close-workbook")
    #[arg(long)]
    fail_at: Option<String>,
}

#[derive(Default)]
struct Sim {
    initialized: bool,
    next_handle: u64,
    /// Open workbooks, mapped to their source path on disk.
    workbooks: HashMap<u64, PathBuf>,
}

fn main() {
    let args = Args::parse();

    eprintln!("[host-sim] starting up");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut sim = Sim::default();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("[host-sim] stdin read error: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("[host-sim] JSON parse error: {e}");
                let resp = Response {
                    id: 0,
                    result: ResponseResult::Error {
                        message: format!("JSON parse error: {e}"),
                    },
                };
                write_response(&mut out, &resp);
                continue;
            }
        };

        let result = if args.fail_at.as_deref() == Some(command_tag(&request.command)) {
            ResponseResult::Error {
                message: format!("simulated failure at {}", command_tag(&request.command)),
            }
        } else {
            handle_command(&mut sim, &request.command)
        };

        let quitting =
            matches!(request.command, Command::Quit) && matches!(result, ResponseResult::Ok { .. });

        let response = Response {
            id: request.id,
            result,
        };
        write_response(&mut out, &response);

        if quitting {
            eprintln!("[host-sim] quit acknowledged, exiting");
            break;
        }
    }

    eprintln!("[host-sim] process exiting");
}

fn write_response(out: &mut impl Write, response: &Response) {
    match serde_json::to_string(response) {
        Ok(json) => {
            let _ = writeln!(out, "{json}");
            let _ = out.flush();
        }
        Err(e) => eprintln!("[host-sim] failed to encode response: {e}"),
    }
}

fn command_tag(command: &Command) -> &'static str {
    match command {
        Command::Init => "init",
        Command::OpenWorkbook { .. } => "open-workbook",
        Command::InjectModule { .. } => "inject-module",
        Command::RunMacro { .. } => "run-macro",
        Command::SaveWorkbook { .. } => "save-workbook",
        Command::CloseWorkbook { .. } => "close-workbook",
        Command::Quit => "quit",
    }
}

fn handle_command(sim: &mut Sim, command: &Command) -> ResponseResult {
    match command {
        Command::Init => {
            sim.initialized = true;
            ok(None)
        }

        Command::OpenWorkbook { path, options } => {
            if !sim.initialized {
                return err("not initialized");
            }
            let path = PathBuf::from(path);
            if !path.exists() {
                return err(format!("cannot open workbook: {} not found", path.display()));
            }
            sim.next_handle += 1;
            sim.workbooks.insert(sim.next_handle, path.clone());
            eprintln!(
                "[host-sim] opened {} as handle {} (read_only={})",
                path.display(),
                sim.next_handle,
                options.read_only
            );
            ok(Some(ResponseData::WorkbookHandle {
                workbook: sim.next_handle,
            }))
        }

        Command::InjectModule {
            workbook,
            name,
            source,
        } => {
            if !sim.workbooks.contains_key(workbook) {
                return err(format!("unknown workbook handle {workbook}"));
            }
            eprintln!(
                "[host-sim] injected module {name} ({} bytes) into workbook {workbook}",
                source.len()
            );
            ok(None)
        }

        Command::RunMacro { name } => {
            eprintln!("[host-sim] ran macro {name}");
            ok(None)
        }

        Command::SaveWorkbook {
            workbook,
            path,
            format: _,
        } => {
            let Some(source) = sim.workbooks.get(workbook) else {
                return err(format!("unknown workbook handle {workbook}"));
            };
            match std::fs::copy(source, path) {
                Ok(bytes) => {
                    eprintln!("[host-sim] saved workbook {workbook} to {path} ({bytes} bytes)");
                    ok(None)
                }
                Err(e) => err(format!("save failed: {e}")),
            }
        }

        Command::CloseWorkbook {
            workbook,
            save_changes: _,
        } => {
            if sim.workbooks.remove(workbook).is_none() {
                return err(format!("unknown workbook handle {workbook}"));
            }
            ok(None)
        }

        Command::Quit => {
            sim.workbooks.clear();
            sim.initialized = false;
            ok(None)
        }
    }
}

fn ok(data: Option<ResponseData>) -> ResponseResult {
    ResponseResult::Ok { data }
}

fn err(message: impl Into<String>) -> ResponseResult {
    ResponseResult::Error {
        message: message.into(),
    }
}
