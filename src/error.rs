use serde::Serialize;
use thiserror::Error;

/// Maximum number of characters of a raw cause shown to the operator.
const MAX_CAUSE_LEN: usize = 200;

/// Shortens an underlying cause for display.
/// Long causes (e.g. a CSV error quoting a whole record) are cut at a char boundary.
fn shorten_cause(msg: &str) -> String {
    if msg.chars().count() <= MAX_CAUSE_LEN {
        return msg.to_string();
    }
    let cut: String = msg.chars().take(MAX_CAUSE_LEN).collect();
    format!("{}...", cut)
}

/// Operator-facing error presentation.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration ─────────────────────────────────────────────────────────
    #[error("No valid tag IDs found in {path}")]
    NoValidKeys { path: String },

    #[error("Invalid tag ID {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Tag ID {0:?} collides with the orphan records destination")]
    KeyCollision(String),

    #[error("Column {column:?} not found in header")]
    KeyColumnMissing { column: String, available: Vec<String> },

    // ── Input CSV ─────────────────────────────────────────────────────────────
    #[error("CSV file has no header row: {0}")]
    NoHeader(String),

    #[error("Invalid CSV: {0}")]
    CsvInvalid(String),

    #[error("Failed to read input: {0}")]
    InputRead(String),

    // ── Output ────────────────────────────────────────────────────────────────
    #[error("Output destination already exists: {path}")]
    DestinationExists { path: String },

    #[error("Failed to write output: {0}")]
    OutputWrite(String),

    // ── Interactive input ─────────────────────────────────────────────────────
    #[error("No files with extension {extension:?} found in {dir}")]
    NoCandidateFiles { dir: String, extension: String },

    #[error("Input ended before a valid answer was given")]
    InputAborted,

    // ── State ─────────────────────────────────────────────────────────────────
    #[error("Demultiplexer is already closed")]
    DemuxClosed,

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Converts the error into a presentation suitable for printing to the operator.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            // ── Configuration ─────────────────────────────────────────────────
            AppError::NoValidKeys { path } => ErrorPresentation {
                title: "No Valid Tag IDs".into(),
                message: format!(
                    "The first line of {} does not list any tag IDs.",
                    path
                ),
                action: Some("Put a comma-separated list of tag IDs on the first line".into()),
            },

            AppError::InvalidKey { key, reason } => ErrorPresentation {
                title: "Invalid Tag ID".into(),
                message: format!("Tag ID {:?} cannot be used as an output name: {}.", key, reason),
                action: Some("Fix the valid tag IDs file and try again".into()),
            },

            AppError::KeyCollision(key) => ErrorPresentation {
                title: "Reserved Tag ID".into(),
                message: format!(
                    "Tag ID {:?} uses the same name as the orphan records output.",
                    key
                ),
                action: Some("Remove or rename that tag ID".into()),
            },

            AppError::KeyColumnMissing { column, available } => ErrorPresentation {
                title: "Column Not Found".into(),
                message: format!(
                    "The input has no column named {:?}. Available columns: {}.",
                    column,
                    available.join(", ")
                ),
                action: Some("Choose one of the available columns".into()),
            },

            // ── Input CSV ─────────────────────────────────────────────────────
            AppError::NoHeader(path) => ErrorPresentation {
                title: "Missing Header".into(),
                message: format!("{} does not start with a header row.", path),
                action: Some("Add a header row to the CSV file".into()),
            },

            AppError::CsvInvalid(msg) => ErrorPresentation {
                title: "Invalid CSV".into(),
                message: format!("The CSV file has a formatting problem: {}", shorten_cause(msg)),
                action: Some("Fix the CSV file and try again".into()),
            },

            AppError::InputRead(msg) => ErrorPresentation {
                title: "Cannot Read Input".into(),
                message: shorten_cause(msg),
                action: Some("Check that the file exists and is readable".into()),
            },

            // ── Output ────────────────────────────────────────────────────────
            AppError::DestinationExists { path } => ErrorPresentation {
                title: "Output Already Exists".into(),
                message: format!("{} already exists; nothing was written.", path),
                action: Some("Move or delete the previous output and run again".into()),
            },

            AppError::OutputWrite(msg) => ErrorPresentation {
                title: "Write Failed".into(),
                message: format!(
                    "Writing output failed, completed files were closed: {}",
                    shorten_cause(msg)
                ),
                action: Some("Check free disk space and permissions".into()),
            },

            // ── Interactive input ─────────────────────────────────────────────
            AppError::NoCandidateFiles { dir, extension } => ErrorPresentation {
                title: "No Files To Choose From".into(),
                message: format!("No {} files were found in {}.", extension, dir),
                action: Some("Run from the directory holding the collar export".into()),
            },

            AppError::InputAborted => ErrorPresentation {
                title: "Cancelled".into(),
                message: "Input ended before a selection was made.".into(),
                action: None,
            },

            // ── State ─────────────────────────────────────────────────────────
            AppError::DemuxClosed => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Records were routed after the outputs were closed.".into(),
                action: None,
            },

            // ── Generic ───────────────────────────────────────────────────────
            AppError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}
