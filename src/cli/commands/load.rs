//! Load command implementation

use std::path::PathBuf;

use crate::cli::commands::{ConfigOverrides, resolve_config};
use crate::cli::error::CliError;
use crate::loader::{Orchestrator, RunReport};
use crate::logging::{LoggingError, init_logging};

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Load command arguments
#[derive(Debug, Clone)]
pub struct LoadArgs {
    /// Config file path
    pub config: PathBuf,
    pub overrides: ConfigOverrides,
    pub format: OutputFormat,
}

/// Run the full pipeline and print the report
pub fn handle_load(args: &LoadArgs) -> Result<(), CliError> {
    let config = resolve_config(&args.config, &args.overrides)?;

    match init_logging(&config.logging) {
        Ok(()) | Err(LoggingError::AlreadyInitialized(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let strict = config.run.strict;
    let orchestrator = Orchestrator::from_config(config)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))?;

    let report = rt.block_on(orchestrator.run())?;

    print_report(&report, args.format)?;

    if strict && report.has_failures() {
        return Err(CliError::FilesFailed(report.files_failed));
    }
    Ok(())
}

fn print_report(report: &RunReport, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => {
            for failure in report.failures() {
                eprintln!(
                    "  failed: {} ({})",
                    failure.path.display(),
                    failure.error.as_deref().unwrap_or("unknown error")
                );
            }
            println!("{}", report.summary());
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report)
                .map_err(|e| CliError::IoError(format!("Failed to serialize report: {}", e)))?;
            println!("{}", json);
        }
    }
    Ok(())
}
