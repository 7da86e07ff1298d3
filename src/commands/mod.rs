//! Operator-facing commands.
//!
//! `filter` performs a run from validated inputs; `prompt` collects those
//! inputs interactively when they are not given on the command line.

pub mod filter;
pub mod prompt;

pub use filter::run_filter;
pub use prompt::{list_local_files, select_file, select_max_lines, Prompter};
