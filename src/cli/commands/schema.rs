//! Schema command implementation
//!
//! Prints the DDL each input file would produce, without connecting.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::cli::commands::{ConfigOverrides, resolve_config};
use crate::cli::error::CliError;
use crate::config::LoaderConfig;
use crate::loader::source::{self, SourceOptions};

/// Schema command arguments
#[derive(Debug, Clone)]
pub struct SchemaArgs {
    pub config: PathBuf,
    pub overrides: ConfigOverrides,
}

/// Derive and print the table definitions for every input file
pub fn handle_schema(args: &SchemaArgs) -> Result<(), CliError> {
    let config = resolve_config(&args.config, &args.overrides)?;
    print!("{}", render_schema(&config)?);
    Ok(())
}

/// DDL for each discovered file in the configured backend's dialect
///
/// Files that cannot be parsed are listed as SQL comments.
pub fn render_schema(config: &LoaderConfig) -> Result<String, CliError> {
    let dialect = config.database.backend.dialect();
    let files = source::discover_files(&config.input.directory, &config.input.pattern)?;
    let options = SourceOptions {
        delimiter: config.delimiter_byte()?,
        surrogate_key: config.schema.surrogate_key.clone(),
    };

    let mut out = String::new();
    for file in &files {
        let Some(table) = source::table_name_for(&file.path) else {
            continue;
        };

        let _ = writeln!(out, "-- {} ({})", file.path.display(), dialect);
        match source::derive(&file.path, &options) {
            Ok(parsed) => {
                let definition = parsed.definition(&table, &config.schema);
                let _ = writeln!(out, "{}\n", definition.create_table_sql(dialect));
            }
            Err(e) => {
                let _ = writeln!(out, "-- skipped: {}\n", e);
            }
        }
    }
    Ok(out)
}
