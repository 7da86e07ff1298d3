//! Interactive prompts for collecting run inputs.
//!
//! Every prompt re-asks until the answer is valid and returns a typed value.
//! End of input is reported as `AppError::InputAborted` instead of looping.

use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::AppError;

/// Lists regular files in `dir` whose names end in `extension` (e.g.
/// `".csv"`), sorted by name. An empty extension lists every file.
pub fn list_local_files(dir: &Path, extension: &str) -> Result<Vec<String>, AppError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        AppError::InputRead(format!("Failed to list {}: {}", dir.display(), e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            AppError::InputRead(format!("Failed to list {}: {}", dir.display(), e))
        })?;
        if !entry.path().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(String::from) else {
            continue;
        };
        if name.ends_with(extension) {
            files.push(name);
        }
    }

    files.sort();
    Ok(files)
}

/// Line-oriented prompt over any input/output pair.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Asks the operator to pick one of `options` by its 1-based number.
    ///
    /// Returns `None` only when `allow_empty` is set and the answer is empty.
    pub fn select(
        &mut self,
        prompt: &str,
        options: &[String],
        allow_empty: bool,
    ) -> Result<Option<String>, AppError> {
        self.say(prompt)?;
        for (idx, option) in options.iter().enumerate() {
            self.say(&format!("{:>3}) {}", idx + 1, option))?;
        }

        loop {
            let answer = self.ask()?;
            if allow_empty && answer.is_empty() {
                return Ok(None);
            }
            let Ok(number) = answer.parse::<usize>() else {
                self.say("Didn't get a valid number, please try again")?;
                continue;
            };
            match number.checked_sub(1).and_then(|i| options.get(i)) {
                Some(option) => return Ok(Some(option.clone())),
                None => self.say("Selection out of range, please try again")?,
            }
        }
    }

    /// Asks for an integer within `[min, max]` (either bound optional).
    ///
    /// Returns `None` only when `allow_empty` is set and the answer is empty.
    pub fn read_int(
        &mut self,
        prompt: &str,
        min: Option<i64>,
        max: Option<i64>,
        allow_empty: bool,
    ) -> Result<Option<i64>, AppError> {
        self.say(prompt)?;
        let limits: Vec<String> = [
            min.map(|n| format!("min value is {}", n)),
            max.map(|n| format!("max value is {}", n)),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !limits.is_empty() {
            self.say(&limits.join("; "))?;
        }

        loop {
            let answer = self.ask()?;
            if allow_empty && answer.is_empty() {
                return Ok(None);
            }
            let Ok(value) = answer.parse::<i64>() else {
                self.say("Didn't get a valid number, please try again")?;
                continue;
            };
            if min.is_some_and(|m| value < m) || max.is_some_and(|m| value > m) {
                self.say("Selection out of range, please try again")?;
                continue;
            }
            return Ok(Some(value));
        }
    }

    fn say(&mut self, line: &str) -> Result<(), AppError> {
        writeln!(self.output, "{}", line)
            .map_err(|e| AppError::Internal(format!("Failed to write prompt: {}", e)))
    }

    /// Reads one trimmed answer line.
    fn ask(&mut self) -> Result<String, AppError> {
        write!(self.output, "-> ")
            .and_then(|_| self.output.flush())
            .map_err(|e| AppError::Internal(format!("Failed to write prompt: {}", e)))?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|e| AppError::InputRead(format!("Failed to read answer: {}", e)))?;
        if read == 0 {
            return Err(AppError::InputAborted);
        }
        Ok(line.trim().to_string())
    }
}

/// Picks a file from `dir` interactively.
pub fn select_file<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    dir: &Path,
    extension: &str,
    prompt: &str,
) -> Result<String, AppError> {
    let files = list_local_files(dir, extension)?;
    if files.is_empty() {
        return Err(AppError::NoCandidateFiles {
            dir: dir.display().to_string(),
            extension: extension.to_string(),
        });
    }
    prompter
        .select(prompt, &files, false)?
        .ok_or(AppError::InputAborted)
}

/// Asks for the lines-per-file limit. Empty or 0 means unlimited.
pub fn select_max_lines<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
) -> Result<u64, AppError> {
    let value = prompter.read_int(
        "Please enter max output file size in number of lines; entering 0 or nothing means no limit",
        Some(0),
        None,
        true,
    )?;
    // The lower bound of 0 makes the conversion infallible.
    Ok(value.and_then(|v| u64::try_from(v).ok()).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn prompter(answers: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(answers.as_bytes().to_vec()), Vec::new())
    }

    fn options() -> Vec<String> {
        vec!["node".into(), "tag".into(), "rssi".into()]
    }

    #[test]
    fn test_select_retries_until_valid() {
        let mut p = prompter("abc\n0\n4\n2\n");
        let choice = p.select("Pick a column", &options(), false).unwrap();
        assert_eq!(choice, Some("tag".to_string()));

        let transcript = String::from_utf8(p.output).unwrap();
        assert!(transcript.contains("  1) node"));
        assert!(transcript.contains("  3) rssi"));
        assert_eq!(transcript.matches("Didn't get a valid number").count(), 1);
        assert_eq!(transcript.matches("out of range").count(), 2);
    }

    #[test]
    fn test_select_empty_answer() {
        let mut p = prompter("\n3\n");
        assert_eq!(p.select("Pick", &options(), true).unwrap(), None);

        let mut p = prompter("\n3\n");
        assert_eq!(
            p.select("Pick", &options(), false).unwrap(),
            Some("rssi".to_string())
        );
    }

    #[test]
    fn test_select_end_of_input_aborts() {
        let mut p = prompter("9\n");
        assert!(matches!(
            p.select("Pick", &options(), false),
            Err(AppError::InputAborted)
        ));
    }

    #[test]
    fn test_read_int_bounds() {
        let mut p = prompter("-1\nten\n12\n");
        let value = p.read_int("How many?", Some(0), Some(100), false).unwrap();
        assert_eq!(value, Some(12));

        let transcript = String::from_utf8(p.output).unwrap();
        assert!(transcript.contains("min value is 0; max value is 100"));
    }

    #[test]
    fn test_max_lines_defaults_to_unlimited() {
        assert_eq!(select_max_lines(&mut prompter("\n")).unwrap(), 0);
        assert_eq!(select_max_lines(&mut prompter("0\n")).unwrap(), 0);
        assert_eq!(select_max_lines(&mut prompter("-5\n250\n")).unwrap(), 250);
    }

    #[test]
    fn test_list_local_files_filters_by_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.csv"), "").unwrap();
        fs::write(dir.path().join("a.csv"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("dir.csv")).unwrap();

        assert_eq!(
            list_local_files(dir.path(), ".csv").unwrap(),
            vec!["a.csv", "b.csv"]
        );
        assert_eq!(list_local_files(dir.path(), "").unwrap().len(), 3);
    }

    #[test]
    fn test_select_file_without_candidates() {
        let dir = TempDir::new().unwrap();
        let result = select_file(&mut prompter("1\n"), dir.path(), ".csv", "Pick");
        assert!(matches!(result, Err(AppError::NoCandidateFiles { .. })));
    }

    #[test]
    fn test_select_file_with_empty_extension_offers_everything() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("raw.csv"), "").unwrap();
        fs::write(dir.path().join("tags.txt"), "").unwrap();

        let chosen = select_file(&mut prompter("2\n"), dir.path(), "", "Pick").unwrap();
        assert_eq!(chosen, "tags.txt");
    }

    #[test]
    fn test_select_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("raw.csv"), "").unwrap();
        fs::write(dir.path().join("valid.csv"), "").unwrap();

        let chosen = select_file(&mut prompter("2\n"), dir.path(), ".csv", "Pick").unwrap();
        assert_eq!(chosen, "valid.csv");
    }
}
