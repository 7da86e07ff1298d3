//! Rolling CSV writer for one named destination.
//!
//! Every part starts with the shared header row and holds at most
//! `max_lines` data rows. Parts are numbered from 0 when a limit is set and
//! unnumbered otherwise. Fields containing a comma, quote or line break are
//! quoted by the `csv` encoder; everything else is written as a plain join.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use csv::{StringRecord, Terminator, Writer, WriterBuilder};
use serde::Serialize;

use crate::config::WriterConfig;
use crate::error::AppError;

/// What a closed writer produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriterSummary {
    /// Destination name.
    pub name: String,
    /// Paths of every part, in creation order.
    pub part_paths: Vec<PathBuf>,
    /// Data rows in each part (parallel to `part_paths`).
    pub rows_per_part: Vec<u64>,
    /// Data rows across all parts.
    pub total_rows: u64,
}

/// The currently open part file.
struct OpenPart {
    writer: Writer<File>,
    path: PathBuf,
}

impl OpenPart {
    fn create(path: PathBuf) -> Result<Self, AppError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => AppError::DestinationExists {
                    path: path.display().to_string(),
                },
                _ => AppError::OutputWrite(format!(
                    "Failed to create {}: {}",
                    path.display(),
                    e
                )),
            })?;

        // Rows may be shorter or longer than the header.
        let writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(file);

        Ok(Self { writer, path })
    }

    fn write_record<I, T>(&mut self, values: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(values).map_err(|e| {
            AppError::OutputWrite(format!("Failed to write to {}: {}", self.path.display(), e))
        })
    }

    /// Flushes buffered rows and releases the file handle.
    fn finish(self) -> Result<PathBuf, AppError> {
        let OpenPart { writer, path } = self;
        let file = writer.into_inner().map_err(|e| {
            AppError::OutputWrite(format!("Failed to flush {}: {}", path.display(), e.error()))
        })?;
        drop(file);
        Ok(path)
    }
}

/// Writes the records of one destination, rolling to a new part file when
/// the row limit is reached.
pub struct ChunkedWriter {
    name: String,
    header: StringRecord,
    config: WriterConfig,
    current: Option<OpenPart>,
    /// Index of the open part, or of the next part to open.
    part_index: u32,
    rows_in_part: u64,
    total_rows: u64,
    part_paths: Vec<PathBuf>,
    rows_per_part: Vec<u64>,
}

impl ChunkedWriter {
    /// Creates the destination and opens part 0 with the header written.
    ///
    /// # Errors
    ///
    /// Returns `AppError::DestinationExists` if the destination directory (or,
    /// in flat mode, the first part file) already exists, and
    /// `AppError::OutputWrite` for any other filesystem failure.
    pub fn new(
        name: impl Into<String>,
        header: &StringRecord,
        config: &WriterConfig,
    ) -> Result<Self, AppError> {
        let name = name.into();

        if config.with_dir {
            create_destination_dir(&config.destination_dir(&name))?;
        }

        let mut writer = Self {
            name,
            header: header.clone(),
            config: config.clone(),
            current: None,
            part_index: 0,
            rows_in_part: 0,
            total_rows: 0,
            part_paths: Vec::new(),
            rows_per_part: Vec::new(),
        };

        if let Err(e) = writer.open_part() {
            if config.with_dir {
                let dir = config.destination_dir(&writer.name);
                if let Err(rm) = fs::remove_dir(&dir) {
                    tracing::warn!(path = %dir.display(), "Failed to remove directory: {}", rm);
                }
            }
            return Err(e);
        }

        Ok(writer)
    }

    /// Destination name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data rows written so far across all parts.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Number of parts created so far.
    pub fn part_count(&self) -> usize {
        self.part_paths.len()
    }

    /// Appends one record to the current part.
    ///
    /// When the part reaches `max_lines` rows it is closed; the next part is
    /// opened by the following `write`, so a full part is never followed by
    /// an empty one.
    pub fn write<I, T>(&mut self, values: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        if self.current.is_none() {
            self.open_part()?;
        }

        let part = self
            .current
            .as_mut()
            .ok_or_else(|| AppError::Internal(format!("{}: no open part", self.name)))?;
        part.write_record(values)?;

        self.rows_in_part += 1;
        self.total_rows += 1;

        if self
            .config
            .max_lines
            .is_some_and(|max| self.rows_in_part >= max)
        {
            self.finish_part()?;
        }

        Ok(())
    }

    /// Flushes and closes the open part, consuming the writer.
    pub fn close(mut self) -> Result<WriterSummary, AppError> {
        self.finish_part()?;

        tracing::debug!(
            destination = %self.name,
            parts = self.part_paths.len(),
            rows = self.total_rows,
            "Closed destination"
        );

        Ok(WriterSummary {
            name: std::mem::take(&mut self.name),
            part_paths: std::mem::take(&mut self.part_paths),
            rows_per_part: std::mem::take(&mut self.rows_per_part),
            total_rows: self.total_rows,
        })
    }

    fn open_part(&mut self) -> Result<(), AppError> {
        let path = self.config.part_path(&self.name, self.part_index);
        let mut part = OpenPart::create(path)?;
        part.write_record(&self.header)?;

        self.part_paths.push(part.path.clone());
        self.rows_in_part = 0;
        self.current = Some(part);

        Ok(())
    }

    /// Closes the open part, if any, and advances the part index.
    fn finish_part(&mut self) -> Result<(), AppError> {
        let Some(part) = self.current.take() else {
            return Ok(());
        };

        self.rows_per_part.push(self.rows_in_part);
        let path = part.finish()?;

        tracing::debug!(
            destination = %self.name,
            part = self.part_index,
            rows = self.rows_in_part,
            path = %path.display(),
            "Completed part"
        );

        self.part_index += 1;
        self.rows_in_part = 0;
        Ok(())
    }
}

impl Drop for ChunkedWriter {
    fn drop(&mut self) {
        if let Some(part) = self.current.take() {
            if let Err(e) = part.finish() {
                tracing::warn!(destination = %self.name, "Failed to close part on drop: {}", e);
            }
        }
    }
}

fn create_destination_dir(dir: &Path) -> Result<(), AppError> {
    fs::create_dir(dir).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => AppError::DestinationExists {
            path: dir.display().to_string(),
        },
        _ => AppError::OutputWrite(format!(
            "Failed to create directory {}: {}",
            dir.display(),
            e
        )),
    })
}
