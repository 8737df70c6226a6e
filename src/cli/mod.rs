//! Command-line interface support for the `csv-loader` binary

pub mod commands;
pub mod error;

pub use error::CliError;
