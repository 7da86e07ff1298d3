//! Input validation for a filter run.
//!
//! Loads the valid tag IDs and opens the collar export, checking that the
//! routing column exists before any output is created.

pub mod input;
pub mod valid_keys;

pub use input::{resolve_key_column, InputSource};
pub use valid_keys::{canonical_key, load_valid_keys, ValidKeys};
