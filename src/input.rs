//! Reading the title list.

use std::path::Path;

use crate::error::{ResolverError, Result};

/// Check that `path` names an existing regular file.
pub fn validate_input_path(path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path).map_err(|e| {
        ResolverError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
    })?;
    if !meta.is_file() {
        return Err(ResolverError::InvalidInput(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    Ok(())
}

/// Read one title per line, trimmed, skipping blank lines.
pub fn read_titles(path: &Path) -> Result<Vec<String>> {
    validate_input_path(path)?;
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|e| {
        ResolverError::InvalidInput(format!("{} is not valid UTF-8: {}", path.display(), e))
    })?;
    Ok(parse_titles(&text))
}

/// Split text into titles. A leading byte-order mark is ignored.
pub fn parse_titles(text: &str) -> Vec<String> {
    text.trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
