//! Routing of input records to per-tag chunked writers.
//!
//! One writer is created per valid tag ID before scanning starts, plus the
//! orphan writer for records whose tag is missing or unknown. Within a
//! destination, records keep their input order.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;

use csv::{Reader, StringRecord};
use serde::Serialize;

use crate::config::{WriterConfig, FALLBACK_NAME};
use crate::error::AppError;
use crate::streaming::chunked_writer::{ChunkedWriter, WriterSummary};
use crate::validation::{canonical_key, resolve_key_column, ValidKeys};

/// Lifecycle of a demultiplexer. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DemuxState {
    /// Destinations are being created.
    Initializing,
    /// Records are being routed.
    Scanning,
    /// Every writer has been closed. Terminal.
    Closed,
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct DemuxSummary {
    /// One entry per valid tag ID, sorted by tag ID.
    pub destinations: Vec<WriterSummary>,
    /// The orphan records destination.
    pub fallback: WriterSummary,
    /// Records routed to a valid tag ID.
    pub matched_records: u64,
    /// Records routed to the orphan destination.
    pub orphan_records: u64,
}

impl DemuxSummary {
    /// Records routed anywhere; equals the number of input records read.
    pub fn total_records(&self) -> u64 {
        self.matched_records + self.orphan_records
    }
}

/// Routes records to one chunked writer per valid tag ID.
pub struct Demultiplexer {
    state: DemuxState,
    key_column: String,
    key_index: usize,
    keys: ValidKeys,
    writers: BTreeMap<String, ChunkedWriter>,
    fallback: Option<ChunkedWriter>,
    matched_records: u64,
    orphan_records: u64,
}

impl Demultiplexer {
    /// Creates every destination and moves to `Scanning`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::KeyColumnMissing` if `key_column` is not in
    /// `header`, and `AppError::DestinationExists` if any destination is
    /// already on disk. Both are detected before anything is created. If a
    /// later creation fails, destinations created so far are removed.
    pub fn new(
        header: &StringRecord,
        key_column: &str,
        keys: &ValidKeys,
        config: &WriterConfig,
    ) -> Result<Self, AppError> {
        let key_index = resolve_key_column(header, key_column)?;

        let names: Vec<&str> = keys.iter().chain(std::iter::once(FALLBACK_NAME)).collect();
        for name in &names {
            let claimed = config.claimed_path(name);
            if claimed.exists() {
                return Err(AppError::DestinationExists {
                    path: claimed.display().to_string(),
                });
            }
        }

        let mut demux = Self {
            state: DemuxState::Initializing,
            key_column: key_column.to_string(),
            key_index,
            keys: keys.clone(),
            writers: BTreeMap::new(),
            fallback: None,
            matched_records: 0,
            orphan_records: 0,
        };

        if let Err(e) = demux.create_writers(header, config) {
            demux.discard_created(config);
            return Err(e);
        }

        demux.state = DemuxState::Scanning;
        tracing::debug!(
            key_column = %demux.key_column,
            destinations = demux.writers.len() + 1,
            "Created destinations"
        );
        Ok(demux)
    }

    fn create_writers(
        &mut self,
        header: &StringRecord,
        config: &WriterConfig,
    ) -> Result<(), AppError> {
        for key in self.keys.iter() {
            let writer = ChunkedWriter::new(key, header, config)?;
            self.writers.insert(key.to_string(), writer);
        }
        self.fallback = Some(ChunkedWriter::new(FALLBACK_NAME, header, config)?);
        Ok(())
    }

    /// Closes and deletes the destinations created by a failed `new`.
    fn discard_created(&mut self, config: &WriterConfig) {
        let created = std::mem::take(&mut self.writers)
            .into_values()
            .chain(self.fallback.take());

        for writer in created {
            let name = writer.name().to_string();
            let removal = writer.close().and_then(|summary| {
                for path in &summary.part_paths {
                    fs::remove_file(path).map_err(|e| AppError::OutputWrite(e.to_string()))?;
                }
                if config.with_dir {
                    fs::remove_dir(config.destination_dir(&name))
                        .map_err(|e| AppError::OutputWrite(e.to_string()))?;
                }
                Ok(())
            });
            if let Err(e) = removal {
                tracing::warn!(destination = %name, "Failed to remove partial output: {}", e);
            }
        }
        self.state = DemuxState::Closed;
    }

    pub fn state(&self) -> DemuxState {
        self.state
    }

    /// Canonical tag ID a record routes to, or `None` for the orphan destination.
    pub fn route(&self, record: &StringRecord) -> Option<String> {
        record
            .get(self.key_index)
            .map(canonical_key)
            .filter(|key| self.keys.contains(key))
    }

    /// Writes one record to its destination.
    ///
    /// A write failure closes every writer before the error is returned.
    pub fn process(&mut self, record: &StringRecord) -> Result<(), AppError> {
        if self.state != DemuxState::Scanning {
            return Err(AppError::DemuxClosed);
        }

        let result = match self.route(record) {
            Some(key) => match self.writers.get_mut(&key) {
                Some(writer) => writer.write(record).map(|()| self.matched_records += 1),
                None => Err(AppError::Internal(format!("No writer for tag ID {}", key))),
            },
            None => match self.fallback.as_mut() {
                Some(writer) => writer.write(record).map(|()| self.orphan_records += 1),
                None => Err(AppError::Internal("No orphan writer".into())),
            },
        };

        if let Err(e) = result {
            self.abort();
            return Err(e);
        }
        Ok(())
    }

    /// Routes every remaining record of `reader`, returning how many were read.
    ///
    /// A malformed record or a write failure closes every writer before the
    /// error is returned.
    pub fn scan<R: Read>(&mut self, reader: &mut Reader<R>) -> Result<u64, AppError> {
        let mut record = StringRecord::new();
        let mut count = 0;

        loop {
            match reader.read_record(&mut record) {
                Ok(true) => {
                    self.process(&record)?;
                    count += 1;
                }
                Ok(false) => break,
                Err(e) => {
                    self.abort();
                    return Err(AppError::CsvInvalid(e.to_string()));
                }
            }
        }

        Ok(count)
    }

    /// Closes every writer and moves to `Closed`.
    ///
    /// All writers are closed even if some fail; the first failure is returned.
    pub fn close(&mut self) -> Result<DemuxSummary, AppError> {
        if self.state == DemuxState::Closed {
            return Err(AppError::DemuxClosed);
        }
        self.state = DemuxState::Closed;

        let mut first_error = None;
        let mut destinations = Vec::with_capacity(self.writers.len());

        for writer in std::mem::take(&mut self.writers).into_values() {
            match writer.close() {
                Ok(summary) => destinations.push(summary),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        let fallback = match self.fallback.take().map(ChunkedWriter::close) {
            Some(Ok(summary)) => Some(summary),
            Some(Err(e)) => {
                first_error.get_or_insert(e);
                None
            }
            None => None,
        };

        if let Some(e) = first_error {
            return Err(e);
        }

        let fallback =
            fallback.ok_or_else(|| AppError::Internal("Orphan writer was never created".into()))?;

        Ok(DemuxSummary {
            destinations,
            fallback,
            matched_records: self.matched_records,
            orphan_records: self.orphan_records,
        })
    }

    /// Best-effort close used on failure paths.
    fn abort(&mut self) {
        if self.state == DemuxState::Closed {
            return;
        }
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close outputs after error: {}", e);
        }
    }
}

impl Drop for Demultiplexer {
    fn drop(&mut self) {
        self.abort();
    }
}
