//! Input discovery and schema derivation
//!
//! Reads each delimited file whole: the header row fixes the field list and
//! every remaining record becomes a row of optional text values.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::info;

use super::error::LoadError;
use crate::config::SchemaSection;
use crate::database::schema::{DEFAULT_SURROGATE_KEY, TableDefinition};
use crate::database::RowValues;

/// A file selected for loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Size in bytes at discovery time
    pub size: u64,
}

/// List the regular files in `dir` whose names match `pattern`
///
/// Matching ignores case and does not descend into subdirectories. The
/// result is sorted by path.
pub fn discover_files(dir: &Path, pattern: &str) -> Result<Vec<DiscoveredFile>, LoadError> {
    let discovery_error = |reason: String| LoadError::Discovery {
        path: dir.to_path_buf(),
        reason,
    };

    let matcher =
        Pattern::new(pattern).map_err(|e| discovery_error(format!("invalid pattern: {}", e)))?;
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let entries = std::fs::read_dir(dir).map_err(|e| discovery_error(e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| discovery_error(e.to_string()))?;
        let metadata = match std::fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let name = entry.file_name();
        if matcher.matches_with(&name.to_string_lossy(), options) {
            files.push(DiscoveredFile {
                path: entry.path(),
                size: metadata.len(),
            });
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Target table name for a file: its name without directory or last extension
pub fn table_name_for(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

/// Parsing options for source files
#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub delimiter: u8,
    /// Reserved column name that header fields may not reuse
    pub surrogate_key: String,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            surrogate_key: DEFAULT_SURROGATE_KEY.to_string(),
        }
    }
}

/// A parsed source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub size: u64,
    /// Normalized header fields, in file order
    pub fields: Vec<String>,
    /// Data rows, each with exactly `fields.len()` values
    pub rows: Vec<RowValues>,
}

impl SourceFile {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn size_kb(&self) -> f64 {
        self.size as f64 / 1024.0
    }

    /// Text-only table definition for this file's fields
    pub fn definition(&self, table: &str, schema: &SchemaSection) -> TableDefinition {
        TableDefinition::text_table(
            table,
            schema.surrogate_key.as_str(),
            &self.fields,
            schema.text_length,
        )
    }
}

/// Read and parse one source file
pub fn derive(path: &Path, options: &SourceOptions) -> Result<SourceFile, LoadError> {
    let size = std::fs::metadata(path)
        .map_err(|e| LoadError::source_read(path, e))?
        .len();

    info!(
        "Started processing file {} ({:.2} KB).",
        path.display(),
        size as f64 / 1024.0
    );

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(false)
        .from_path(path)
        .map_err(|e| LoadError::source_read(path, e))?;

    let raw_headers: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::source_read(path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    if raw_headers.is_empty() {
        return Err(LoadError::source_read(path, "missing header row"));
    }

    let fields = normalize_headers(&raw_headers, &options.surrogate_key)
        .map_err(|reason| LoadError::source_read(path, reason))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LoadError::source_read(path, e))?;
        rows.push(
            record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect(),
        );
    }

    info!(
        "Successfully loaded data from {}. Rows: {}.",
        path.display(),
        rows.len()
    );

    Ok(SourceFile {
        path: path.to_path_buf(),
        size,
        fields,
        rows,
    })
}

/// Trim header cells and name blank ones by position
///
/// Rejects duplicates (ignoring case) and any field equal to the
/// surrogate key column.
pub fn normalize_headers(raw: &[String], surrogate_key: &str) -> Result<Vec<String>, String> {
    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(raw.len());

    for (i, cell) in raw.iter().enumerate() {
        let trimmed = cell.trim_start_matches('\u{feff}').trim();
        let name = if trimmed.is_empty() {
            format!("column_{}", i + 1)
        } else {
            trimmed.to_string()
        };

        if name.eq_ignore_ascii_case(surrogate_key) {
            return Err(format!(
                "header field '{}' collides with the surrogate key column",
                name
            ));
        }
        if !seen.insert(name.to_lowercase()) {
            return Err(format!("duplicate header field '{}'", name));
        }
        fields.push(name);
    }

    Ok(fields)
}
