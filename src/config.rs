//! Output layout configuration shared by every destination of a run.

use std::path::{Path, PathBuf};

/// Name of the destination receiving records with a missing or unknown tag ID.
pub const FALLBACK_NAME: &str = "orphan_ids";

/// Extension of every file part.
pub const PART_EXTENSION: &str = "csv";

/// Configuration applied uniformly to every chunked writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// Place each destination's parts inside a directory named after it.
    pub with_dir: bool,
    /// Maximum data rows per part (excluding header). `None` means a single,
    /// unnumbered part.
    pub max_lines: Option<u64>,
    /// Directory under which destinations are created.
    pub output_root: PathBuf,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            with_dir: true,
            max_lines: None,
            output_root: PathBuf::from("."),
        }
    }
}

impl WriterConfig {
    /// Sets the row limit per part. Zero means unlimited.
    pub fn max_lines(mut self, max_lines: u64) -> Self {
        self.max_lines = (max_lines > 0).then_some(max_lines);
        self
    }

    /// Sets whether each destination gets its own directory.
    pub fn with_dir(mut self, with_dir: bool) -> Self {
        self.with_dir = with_dir;
        self
    }

    /// Sets the directory under which destinations are created.
    pub fn output_root(mut self, root: impl AsRef<Path>) -> Self {
        self.output_root = root.as_ref().to_path_buf();
        self
    }

    /// Directory holding the parts of destination `name`.
    pub fn destination_dir(&self, name: &str) -> PathBuf {
        if self.with_dir {
            self.output_root.join(name)
        } else {
            self.output_root.clone()
        }
    }

    /// File name of part `index` of destination `name`.
    ///
    /// Single-file mode ignores the index: `<name>.csv`. Multi-file mode
    /// numbers parts from 0: `<name>_<index>.csv`.
    pub fn part_file_name(&self, name: &str, index: u32) -> String {
        match self.max_lines {
            Some(_) => format!("{}_{}.{}", name, index, PART_EXTENSION),
            None => format!("{}.{}", name, PART_EXTENSION),
        }
    }

    /// Full path of part `index` of destination `name`.
    pub fn part_path(&self, name: &str, index: u32) -> PathBuf {
        self.destination_dir(name).join(self.part_file_name(name, index))
    }

    /// The path whose prior existence blocks creating destination `name`.
    ///
    /// With directories that is the destination directory itself; in flat
    /// mode it is the first part file.
    pub fn claimed_path(&self, name: &str) -> PathBuf {
        if self.with_dir {
            self.destination_dir(name)
        } else {
            self.part_path(name, 0)
        }
    }
}
