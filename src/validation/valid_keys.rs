//! Loading and canonicalizing the set of valid tag IDs.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use csv::ReaderBuilder;

use crate::config::FALLBACK_NAME;
use crate::error::AppError;

/// Returns the canonical form of a tag ID: uppercased, otherwise unchanged.
pub fn canonical_key(raw: &str) -> String {
    raw.to_uppercase()
}

/// The immutable set of canonical tag IDs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidKeys {
    keys: BTreeSet<String>,
}

impl ValidKeys {
    /// Builds the set from raw tag IDs.
    ///
    /// Entries are trimmed and canonicalized, blanks dropped and duplicates
    /// collapsed.
    ///
    /// Each key becomes a file and directory name, so keys that would escape
    /// the output directory or shadow the orphan destination are rejected.
    pub fn from_values<I, S>(values: I, source: &str) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys = BTreeSet::new();
        for value in values {
            let key = canonical_key(value.as_ref().trim());
            if key.is_empty() {
                continue;
            }
            check_key(&key)?;
            keys.insert(key);
        }

        if keys.is_empty() {
            return Err(AppError::NoValidKeys {
                path: source.to_string(),
            });
        }

        Ok(Self { keys })
    }

    /// Whether `canonical` is one of the valid tag IDs.
    pub fn contains(&self, canonical: &str) -> bool {
        self.keys.contains(canonical)
    }

    /// Number of distinct tag IDs. Never zero.
    pub fn count(&self) -> usize {
        self.keys.len()
    }

    /// Tag IDs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

fn check_key(key: &str) -> Result<(), AppError> {
    let invalid = |reason: &str| AppError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key == "." || key == ".." {
        return Err(invalid("it is a relative directory name"));
    }
    if key.contains(['/', '\\']) {
        return Err(invalid("it contains a path separator"));
    }
    if key.contains('\0') {
        return Err(invalid("it contains a NUL byte"));
    }
    if key.eq_ignore_ascii_case(FALLBACK_NAME) {
        return Err(AppError::KeyCollision(key.to_string()));
    }
    Ok(())
}

/// Loads valid tag IDs from the first line of a CSV file.
///
/// Only the first line is read; it holds a comma-separated list of tag IDs.
/// Quoted entries are allowed.
///
/// # Errors
///
/// Returns `AppError::NoValidKeys` if the first line is missing or lists no
/// IDs, and `AppError::InputRead`/`AppError::CsvInvalid` if the file cannot
/// be read or parsed.
pub fn load_valid_keys(path: &Path) -> Result<ValidKeys, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::InputRead(format!("Failed to open {}: {}", path.display(), e))
    })?;

    // The csv reader skips blank lines, so isolate the first physical line.
    let mut first_line = String::new();
    BufReader::new(file)
        .read_line(&mut first_line)
        .map_err(|e| AppError::InputRead(format!("Failed to read {}: {}", path.display(), e)))?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(first_line.as_bytes());

    let record = match reader.records().next() {
        Some(record) => record.map_err(|e| {
            AppError::CsvInvalid(format!("{}: {}", path.display(), e))
        })?,
        None => {
            return Err(AppError::NoValidKeys {
                path: path.display().to_string(),
            })
        }
    };

    let keys = ValidKeys::from_values(
        record.iter().map(|v| v.trim_start_matches('\u{feff}')),
        &path.display().to_string(),
    )?;

    tracing::info!(path = %path.display(), count = keys.count(), "Loaded valid tag IDs");
    Ok(keys)
}
