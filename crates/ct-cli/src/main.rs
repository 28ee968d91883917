//! CyferTrace scan CLI

use clap::{Parser, Subcommand, ValueEnum};
use ct_core::report::{self, ReportFormat};
use ct_core::{MemoryScanStore, ScanManager, ScanRecord, ScanStatus, ScanType};
use ct_tools::ToolConfig;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "ct-scan")]
#[command(about = "Web application and infrastructure-as-code security scans")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Report format
    #[arg(long, value_enum, global = true, default_value = "json")]
    format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short = 'O', long, global = true)]
    output_file: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a web application
    Was {
        /// Target URL
        #[arg(short, long)]
        target: String,
    },

    /// Scan an infrastructure-as-code file
    Iac {
        /// Path to the template
        #[arg(short, long)]
        file: PathBuf,

        /// Checkov executable (defaults to PATH lookup)
        #[arg(long)]
        checkov: Option<PathBuf>,

        /// Checkov timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Pdf,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Pdf => ReportFormat::Pdf,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set subscriber: {}", e);
    }

    let (scan_type, target, tools) = match cli.command {
        Commands::Was { target } => (ScanType::WebApplication, target, ToolConfig::default()),
        Commands::Iac { file, checkov, timeout } => {
            if !file.exists() {
                error!("File not found: {}", file.display());
                return ExitCode::FAILURE;
            }
            let mut tools = ToolConfig::default().with_timeout(timeout);
            if let Some(path) = checkov {
                tools = tools.with_tool_path("checkov", path);
            }
            (ScanType::InfrastructureAsCode, file.display().to_string(), tools)
        }
    };

    let manager = ScanManager::with_default_scanners(Arc::new(MemoryScanStore::new()), tools).await;

    let record = match manager.run(scan_type, &target, "cli").await {
        Ok(record) => record,
        Err(e) => {
            error!("Scan failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if record.status() == ScanStatus::Failed {
        error!("Scan failed: {}", record.error().unwrap_or("unknown error"));
        return ExitCode::FAILURE;
    }

    match write_report(&record, cli.format.into(), cli.output_file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn write_report(
    record: &ScanRecord,
    format: ReportFormat,
    output_file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = report::generate_report(record, format)?;

    match output_file {
        Some(path) => {
            std::fs::write(&path, &content)?;
            info!("Report written to: {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content)?;
            if format == ReportFormat::Json {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()?;
        }
    }
    Ok(())
}
