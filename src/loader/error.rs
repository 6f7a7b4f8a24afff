use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or parsing a YAML artifact
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("syntax error in {}:{line}:{column}: {reason}", file.display())]
    Syntax {
        file: PathBuf,
        line: usize,
        column: usize,
        reason: String,
    },

    #[error("I/O error reading {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

impl LoaderError {
    pub fn file(&self) -> &std::path::Path {
        match self {
            LoaderError::Syntax { file, .. } => file,
            LoaderError::Io { path, .. } => path,
        }
    }
}
