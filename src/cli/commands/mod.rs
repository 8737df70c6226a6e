//! CLI command implementations

pub mod init;
pub mod load;
pub mod schema;

use std::path::{Path, PathBuf};

use crate::cli::error::CliError;
use crate::config::{DatabaseBackendType, LoaderConfig};

/// Command-line values that take precedence over the config file and
/// environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input_dir: Option<PathBuf>,
    pub backend: Option<String>,
    pub duckdb_path: Option<String>,
    pub pattern: Option<String>,
    pub log_file: Option<PathBuf>,
    pub strict: bool,
}

/// Load the config file, layer environment and command-line overrides on
/// top, then validate the result
pub fn resolve_config(
    config_path: &Path,
    overrides: &ConfigOverrides,
) -> Result<LoaderConfig, CliError> {
    let mut config = LoaderConfig::load(config_path)?;

    if let Some(dir) = &overrides.input_dir {
        config.input.directory = dir.clone();
    }
    if let Some(backend) = &overrides.backend {
        config.database.backend = backend
            .parse::<DatabaseBackendType>()
            .map_err(CliError::InvalidArgument)?;
    }
    if let Some(path) = &overrides.duckdb_path {
        config.database.path = path.clone();
    }
    if let Some(pattern) = &overrides.pattern {
        config.input.pattern = pattern.clone();
    }
    if let Some(file) = &overrides.log_file {
        config.logging.file = Some(file.clone());
    }
    if overrides.strict {
        config.run.strict = true;
    }

    config.validate()?;
    Ok(config)
}
