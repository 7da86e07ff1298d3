//! The filter run: route one collar export into per-tag output files.

use tracing::info;

use crate::config::WriterConfig;
use crate::error::AppError;
use crate::streaming::{Demultiplexer, DemuxSummary};
use crate::validation::{InputSource, ValidKeys};

/// Routes every record of `source` to its tag's destination.
///
/// Destinations are created for every valid tag ID (plus the orphan
/// destination) before the first record is read, and are all closed before
/// this returns, on success or failure.
///
/// # Errors
///
/// Configuration problems (`KeyColumnMissing`, `DestinationExists`) are
/// reported before any output exists. Malformed input (`CsvInvalid`) and
/// write failures (`OutputWrite`) end the run after closing all outputs.
pub fn run_filter(
    source: InputSource,
    key_column: &str,
    keys: &ValidKeys,
    config: &WriterConfig,
) -> Result<DemuxSummary, AppError> {
    info!(
        input = %source.path().display(),
        key_column,
        tags = keys.count(),
        max_lines = ?config.max_lines,
        output = %config.output_root.display(),
        "Starting filter run"
    );

    let (header, mut reader) = source.into_parts();
    let mut demux = Demultiplexer::new(&header, key_column, keys, config)?;
    demux.scan(&mut reader)?;
    let summary = demux.close()?;

    info!(
        records = summary.total_records(),
        matched = summary.matched_records,
        orphans = summary.orphan_records,
        "Filter run complete"
    );
    for destination in summary.destinations.iter().chain(Some(&summary.fallback)) {
        info!(
            destination = %destination.name,
            rows = destination.total_rows,
            parts = destination.part_paths.len(),
            "Wrote destination"
        );
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const RAW_BEEPS: &str = "node,parent,when,radio_id,tag,frequency,rssi\n\
        n1,p1,2021-06-01T00:00:01,1,1a2b3c4d,434,-82\n\
        n1,p1,2021-06-01T00:00:02,1,55667788,434,-90\n\
        n2,p1,2021-06-01T00:00:03,2,1A2B3C4D,434,-75\n\
        n2,p1,2021-06-01T00:00:04,2,,434,-71\n\
        n3,p2,2021-06-01T00:00:05,1,1a2b3c4d,434,-88\n";

    fn create_input(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("raw_beeps.csv");
        fs::write(&path, content).expect("Failed to write input");
        path
    }

    /// Every data line written, across all destinations.
    fn all_output_rows(summary: &DemuxSummary) -> Vec<String> {
        let mut rows = Vec::new();
        for destination in summary.destinations.iter().chain(Some(&summary.fallback)) {
            for path in &destination.part_paths {
                let content = fs::read_to_string(path).unwrap();
                rows.extend(content.lines().skip(1).map(String::from));
            }
        }
        rows
    }

    #[test]
    fn test_every_record_lands_exactly_once() {
        let input_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let source = InputSource::open(&create_input(input_dir.path(), RAW_BEEPS)).unwrap();
        let keys = ValidKeys::from_values(["1A2B3C4D", "DEADBEEF"], "test").unwrap();
        let config = WriterConfig::default().output_root(out_dir.path()).max_lines(1);

        let summary = run_filter(source, "tag", &keys, &config).unwrap();
        assert_eq!(summary.total_records(), 5);
        assert_eq!(summary.matched_records, 3);
        assert_eq!(summary.orphan_records, 2);

        let mut written = all_output_rows(&summary);
        let mut expected: Vec<String> = RAW_BEEPS.lines().skip(1).map(String::from).collect();
        written.sort();
        expected.sort();
        assert_eq!(written, expected);

        // Zero-match tag still gets its header-only file
        let content =
            fs::read_to_string(out_dir.path().join("DEADBEEF").join("DEADBEEF_0.csv")).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with("node,parent,when"));
    }

    #[test]
    fn test_unlimited_writes_unnumbered_files() {
        let input_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let source = InputSource::open(&create_input(input_dir.path(), RAW_BEEPS)).unwrap();
        let keys = ValidKeys::from_values(["1a2b3c4d"], "test").unwrap();
        let config = WriterConfig::default().output_root(out_dir.path()).max_lines(0);

        let summary = run_filter(source, "tag", &keys, &config).unwrap();

        assert_eq!(
            summary.destinations[0].part_paths,
            vec![out_dir.path().join("1A2B3C4D").join("1A2B3C4D.csv")]
        );
        assert_eq!(summary.destinations[0].total_rows, 3);
        assert!(out_dir.path().join("orphan_ids").join("orphan_ids.csv").is_file());
    }

    #[test]
    fn test_short_and_long_rows_are_routed() {
        let input_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let content = "node,tag,rssi\n\
            n1\n\
            n2,A1,-80,ridge\n\
            n3,A1,-81\n";
        let source = InputSource::open(&create_input(input_dir.path(), content)).unwrap();
        let keys = ValidKeys::from_values(["A1"], "test").unwrap();
        let config = WriterConfig::default().output_root(out_dir.path());

        let summary = run_filter(source, "tag", &keys, &config).unwrap();
        assert_eq!(summary.matched_records, 2);
        assert_eq!(summary.orphan_records, 1);

        let a1 = fs::read_to_string(out_dir.path().join("A1").join("A1.csv")).unwrap();
        assert_eq!(a1, "node,tag,rssi\nn2,A1,-80,ridge\nn3,A1,-81\n");
        let orphans =
            fs::read_to_string(out_dir.path().join("orphan_ids").join("orphan_ids.csv")).unwrap();
        assert_eq!(orphans, "node,tag,rssi\nn1\n");
    }

    #[test]
    fn test_unknown_column_creates_no_output() {
        let input_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let source = InputSource::open(&create_input(input_dir.path(), RAW_BEEPS)).unwrap();
        let keys = ValidKeys::from_values(["1A2B3C4D"], "test").unwrap();
        let config = WriterConfig::default().output_root(out_dir.path());

        let result = run_filter(source, "tag_id", &keys, &config);

        assert!(matches!(result, Err(AppError::KeyColumnMissing { .. })));
        assert_eq!(fs::read_dir(out_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_second_run_refuses_to_overwrite() {
        let input_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let input = create_input(input_dir.path(), RAW_BEEPS);
        let keys = ValidKeys::from_values(["1A2B3C4D"], "test").unwrap();
        let config = WriterConfig::default().output_root(out_dir.path());

        run_filter(InputSource::open(&input).unwrap(), "tag", &keys, &config).unwrap();
        let before = fs::read_to_string(out_dir.path().join("1A2B3C4D").join("1A2B3C4D.csv"))
            .unwrap();

        let result = run_filter(InputSource::open(&input).unwrap(), "tag", &keys, &config);
        assert!(matches!(result, Err(AppError::DestinationExists { .. })));

        let after = fs::read_to_string(out_dir.path().join("1A2B3C4D").join("1A2B3C4D.csv"))
            .unwrap();
        assert_eq!(before, after);
    }
}
