//! Common utility functions for lens modules
//!
//! Output format selection and expansion of list-valued inputs.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;
use std::path::Path;

/// Output format for lookup results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// One CIDR block per line (default)
    #[default]
    Cidr,
    /// JSON Lines, one object per record
    Json,
    /// Pipe-separated values with header
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cidr => write!(f, "cidr"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Expand list-valued arguments
///
/// Each value is either a path to an existing file (one entry per line) or a
/// comma-separated list. Blank entries are dropped.
pub fn expand_values(values: &[String]) -> Result<Vec<String>> {
    let mut expanded = vec![];
    for value in values {
        let path = Path::new(value.trim());
        if !value.trim().is_empty() && path.is_file() {
            let file = std::fs::File::open(path)
                .map_err(|e| anyhow!("Unable to open {}: {}", path.display(), e))?;
            expanded.extend(read_entries(std::io::BufReader::new(file))?);
        } else {
            expanded.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }
    }
    Ok(expanded)
}

/// Read one entry per line, skipping blank lines
pub fn read_entries<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut entries = vec![];
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            entries.push(line.to_string());
        }
    }
    Ok(entries)
}
