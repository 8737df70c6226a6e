//! Init command implementation

use std::path::{Path, PathBuf};

use crate::cli::error::CliError;
use crate::config::{CONFIG_FILENAME, sample_config};

/// Init command arguments
#[derive(Debug, Clone)]
pub struct InitArgs {
    /// Directory the config file is written to
    pub dir: PathBuf,
    /// Overwrite an existing config file
    pub force: bool,
}

/// Write a commented sample configuration file
pub fn handle_init(args: &InitArgs) -> Result<(), CliError> {
    let path = write_sample_config(&args.dir, args.force)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn write_sample_config(dir: &Path, force: bool) -> Result<PathBuf, CliError> {
    let path = dir.join(CONFIG_FILENAME);
    if path.exists() && !force {
        return Err(CliError::FileExists(path));
    }

    std::fs::create_dir_all(dir)
        .map_err(|e| CliError::IoError(format!("Failed to create {}: {}", dir.display(), e)))?;
    std::fs::write(&path, sample_config())
        .map_err(|e| CliError::IoError(format!("Failed to write {}: {}", path.display(), e)))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        write_sample_config(dir.path(), false).unwrap();

        let err = write_sample_config(dir.path(), false).unwrap_err();
        assert!(matches!(err, CliError::FileExists(_)));

        assert!(write_sample_config(dir.path(), true).is_ok());
    }

    #[test]
    fn test_init_creates_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("etl");
        let path = write_sample_config(&target, false).unwrap();
        assert!(path.ends_with(CONFIG_FILENAME));
        assert!(std::fs::read_to_string(path).unwrap().contains("[retry]"));
    }
}
