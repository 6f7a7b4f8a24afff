use std::path::PathBuf;
use thiserror::Error;

use crate::loader::LoaderError;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to load artifact: {0}")]
    Load(#[from] LoaderError),

    #[error("{}: {reason}", file.display())]
    Structural { file: PathBuf, reason: String },

    #[error("Circular include chain: {}", display_chain(chain))]
    Cycle { chain: Vec<PathBuf> },
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
