//! CLI binary entry point for csv-loader

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use csv_table_loader::cli::commands::ConfigOverrides;
#[cfg(feature = "cli")]
use csv_table_loader::cli::commands::init::{InitArgs, handle_init};
#[cfg(feature = "cli")]
use csv_table_loader::cli::commands::load::{LoadArgs, OutputFormat, handle_load};
#[cfg(feature = "cli")]
use csv_table_loader::cli::commands::schema::{SchemaArgs, handle_schema};
#[cfg(feature = "cli")]
use csv_table_loader::config::CONFIG_FILENAME;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "csv-loader")]
#[command(about = "Load a directory of CSV files into database tables, one table per file")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Truncate and reload one table per input file
    Load {
        /// Input directory (overrides [input] directory)
        dir: Option<PathBuf>,
        /// Configuration file
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        config: PathBuf,
        /// Database backend: duckdb or postgres
        #[arg(short, long)]
        backend: Option<String>,
        /// DuckDB database file, or ":memory:"
        #[arg(long)]
        duckdb_path: Option<String>,
        /// File name pattern, matched case-insensitively
        #[arg(short, long)]
        pattern: Option<String>,
        /// Also append log events to this file
        #[arg(long)]
        log_file: Option<PathBuf>,
        /// Exit with status 2 if any file fails to load
        #[arg(long)]
        strict: bool,
        /// Report format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Print the DDL each input file would produce, without connecting
    Schema {
        /// Input directory (overrides [input] directory)
        dir: Option<PathBuf>,
        /// Configuration file
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        config: PathBuf,
        /// Database backend whose dialect is printed
        #[arg(short, long)]
        backend: Option<String>,
        /// File name pattern, matched case-insensitively
        #[arg(short, long)]
        pattern: Option<String>,
    },
    /// Write a sample configuration file
    Init {
        /// Target directory
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Load {
            dir,
            config,
            backend,
            duckdb_path,
            pattern,
            log_file,
            strict,
            format,
        } => {
            let args = LoadArgs {
                config,
                overrides: ConfigOverrides {
                    input_dir: dir,
                    backend,
                    duckdb_path,
                    pattern,
                    log_file,
                    strict,
                },
                format,
            };
            handle_load(&args)
        }
        Commands::Schema {
            dir,
            config,
            backend,
            pattern,
        } => {
            let args = SchemaArgs {
                config,
                overrides: ConfigOverrides {
                    input_dir: dir,
                    backend,
                    pattern,
                    ..Default::default()
                },
            };
            handle_schema(&args)
        }
        Commands::Init { dir, force } => handle_init(&InitArgs { dir, force }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
