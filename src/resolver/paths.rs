//! Path resolution the way the host framework does it

use std::path::{Component, Path, PathBuf};

use crate::tasks::splitter::unquote;

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Makes `path` absolute against the working directory and removes `.` and
/// `..` components without touching the filesystem.
pub fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    normalize_lexically(&joined)
}

pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(normalized.components().next_back(), Some(Component::Normal(_)))
                    && normalized.pop();
                if !popped && !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Resolves `given` relative to `basedir` unless it is absolute or starts at
/// the home directory. The result is absolute and lexically normalized.
pub fn path_dwim(basedir: &Path, given: &str) -> PathBuf {
    let given = Path::new(unquote(given.trim()));
    if given.is_absolute() || given.starts_with("~") {
        absolute(&expand_home(given))
    } else {
        absolute(&basedir.join(given))
    }
}

/// Whether a value still holds a variable reference after templating.
pub fn is_unresolved(value: &str) -> bool {
    value.contains('$') || value.contains("{{")
}

/// Path part of an include value such as `tasks/x.yml tags=a when=b`.
///
/// Leading `key=value` tokens are skipped and the path ends at the next one.
pub fn include_path(value: &str) -> Option<String> {
    let tokens = shell_words::split(value)
        .unwrap_or_else(|_| value.split_whitespace().map(str::to_string).collect());

    let path: Vec<String> = tokens
        .into_iter()
        .skip_while(|t| t.contains('='))
        .take_while(|t| !t.contains('='))
        .collect();

    (!path.is_empty()).then(|| path.join(" "))
}
