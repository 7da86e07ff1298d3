//! Opening the collar export and resolving its routing column.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{Reader, ReaderBuilder, StringRecord};

use crate::error::AppError;

/// UTF-8 BOM as it appears at the start of the first header field.
const UTF8_BOM: char = '\u{feff}';

/// An opened input CSV with its header already read.
pub struct InputSource {
    path: PathBuf,
    header: StringRecord,
    reader: Reader<File>,
}

impl InputSource {
    /// Opens `path` and reads its header row.
    ///
    /// Rows are read in flexible mode: a row may be shorter or longer than
    /// the header, and a short row simply lacks the trailing columns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InputRead` if the file cannot be opened,
    /// `AppError::NoHeader` if it has no (or an empty) header row, and
    /// `AppError::CsvInvalid` if the header cannot be parsed.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path).map_err(|e| {
            AppError::InputRead(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let raw = reader
            .headers()
            .map_err(|e| AppError::CsvInvalid(format!("{}: {}", path.display(), e)))?;
        let header: StringRecord = raw
            .iter()
            .enumerate()
            .map(|(i, field)| {
                if i == 0 {
                    field.trim_start_matches(UTF8_BOM)
                } else {
                    field
                }
            })
            .collect();

        if header.iter().all(|f| f.trim().is_empty()) {
            return Err(AppError::NoHeader(path.display().to_string()));
        }

        tracing::debug!(path = %path.display(), columns = header.len(), "Opened input");

        Ok(Self {
            path: path.to_path_buf(),
            header,
            reader,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column names, in file order.
    pub fn header(&self) -> &StringRecord {
        &self.header
    }

    /// Column names as owned strings, for display and selection.
    pub fn column_names(&self) -> Vec<String> {
        self.header.iter().map(String::from).collect()
    }

    /// Consumes the source, returning the header and the positioned reader.
    pub fn into_parts(self) -> (StringRecord, Reader<File>) {
        (self.header, self.reader)
    }
}

/// Finds the index of the routing column in `header`.
///
/// # Errors
///
/// Returns `AppError::KeyColumnMissing` when no column has that exact name.
pub fn resolve_key_column(header: &StringRecord, column: &str) -> Result<usize, AppError> {
    header
        .iter()
        .position(|name| name == column)
        .ok_or_else(|| AppError::KeyColumnMissing {
            column: column.to_string(),
            available: header.iter().map(String::from).collect(),
        })
}
