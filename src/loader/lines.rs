//! Raw line view of a YAML file for checks that work on text regions

use std::fs;
use std::path::Path;

use super::error::LoaderError;

/// Which non-content lines to drop besides comments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripOptions {
    /// Drop `---` document-start lines.
    pub remove_markers: bool,
    /// Drop blank lines.
    pub remove_empty: bool,
}

/// Returns `(line_number, raw_line)` pairs, numbered from one, with
/// comment-only lines removed and markers/blank lines removed per `options`.
/// Lines keep their terminator.
pub fn strip_comments_and_markers(
    path: &Path,
    options: StripOptions,
) -> Result<Vec<(usize, String)>, LoaderError> {
    let text = fs::read_to_string(path).map_err(|error| LoaderError::Io {
        path: path.to_path_buf(),
        error,
    })?;
    Ok(strip_lines(&text, options))
}

pub(crate) fn strip_lines(text: &str, options: StripOptions) -> Vec<(usize, String)> {
    text.split_inclusive('\n')
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !(trimmed.starts_with('#')
                || (options.remove_markers && trimmed == "---")
                || (options.remove_empty && trimmed.is_empty()))
        })
        .map(|(i, line)| (i, line.to_string()))
        .collect()
}
