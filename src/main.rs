use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use macrodrive::api::{run_server, ServerConfig};
use macrodrive::cli;
use macrodrive::AppConfig;

#[derive(Parser)]
#[command(name = "macrodrive")]
#[command(about = "Relay uploaded workbooks through an external spreadsheet host's macros")]
#[command(long_about = "Macrodrive - spreadsheet macro relay

Accepts .xls/.xlsx uploads over HTTP, runs the fixed filter and profit
macros against them via the automation bridge, and returns the processed
workbook. The reference workbook and both macro sources live in the assets
directory (next to the binary by default).

COMMANDS:
  serve    - Start the HTTP upload server
  process  - Run the macro pipeline against a local workbook

EXAMPLES:
  macrodrive serve --host 0.0.0.0 --port 8000
  macrodrive process report.xlsx
  macrodrive --bridge-cmd 'wine excel-macro-bridge.exe' serve")]
#[command(version)]
struct Cli {
    /// Directory where uploads are staged before processing
    #[arg(long, env = "MACRODRIVE_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Directory where processed workbooks are written
    #[arg(long, env = "MACRODRIVE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory holding the reference workbook and macro sources
    #[arg(long, env = "MACRODRIVE_ASSETS_DIR")]
    assets_dir: Option<PathBuf>,

    /// Bridge command as a space-separated program and arguments
    #[arg(long, env = "MACRODRIVE_BRIDGE_CMD", value_delimiter = ' ')]
    bridge_cmd: Option<Vec<String>>,

    /// Settle delay after automation calls, in milliseconds
    #[arg(long, env = "MACRODRIVE_SETTLE_MS")]
    settle_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP upload server
    Serve {
        /// Host address to bind to (use 0.0.0.0 for all interfaces)
        #[arg(short = 'H', long, default_value = "0.0.0.0", env = "MACRODRIVE_HOST")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8000", env = "MACRODRIVE_PORT")]
        port: u16,
    },

    /// Run the macro pipeline against a local workbook, without HTTP
    Process {
        /// Path to a .xls/.xlsx workbook
        file: PathBuf,
    },
}

fn build_config(args: &Cli) -> AppConfig {
    let mut config = AppConfig::default();
    if let Some(dir) = &args.staging_dir {
        config.staging_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &args.assets_dir {
        config.assets_dir = dir.clone();
    }
    if let Some(cmd) = &args.bridge_cmd {
        config.bridge_command = cmd.clone();
    }
    if let Some(ms) = args.settle_ms {
        config.settle_delay = Duration::from_millis(ms);
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = build_config(&args);

    match args.command {
        Commands::Serve { host, port } => {
            run_server(config, ServerConfig { host, port }).await
        }
        Commands::Process { file } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "macrodrive=info".into()),
                )
                .init();
            config.ensure_dirs()?;
            cli::process(&config, &file)?;
            Ok(())
        }
    }
}
