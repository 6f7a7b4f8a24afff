use std::path::{Path, PathBuf};
use thiserror::Error;

/// A task whose action declaration cannot be resolved
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GrammarError {
    #[error("conflicting action statements: {first}, {second}")]
    ConflictingActions { first: String, second: String },

    #[error("action and local_action are mutually exclusive")]
    ExclusiveActionKeys,

    #[error("no module/action detected in task")]
    NoAction,

    #[error("couldn't resolve module/action '{module}'")]
    UnresolvedModule { module: String },

    #[error("this task '{module}' has extra params, which is only allowed in modules that take free-form arguments")]
    ExtraParams { module: String },

    #[error("unexpected parameter type in action: {found}")]
    UnexpectedType { found: String },

    #[error("complex args must be a dictionary or variable string (\"{{{{var}}}}\")")]
    InvalidArgs,

    #[error("invalid parameter specified for action '{module}': '{param}'")]
    InternalParam { module: String, param: String },
}

/// Errors raised while flattening a file into raw tasks
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("{}: key '{key}' defined, but bad value: '{value}'", file.display())]
    Structural {
        file: PathBuf,
        key: String,
        value: String,
    },
}

/// Errors raised while turning a raw task into an action
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("{}: {source}", location_text(file, *line))]
    Grammar {
        file: PathBuf,
        line: Option<usize>,
        #[source]
        source: GrammarError,
    },
}

impl NormalizeError {
    pub fn file(&self) -> &Path {
        match self {
            NormalizeError::Grammar { file, .. } => file,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            NormalizeError::Grammar { line, .. } => *line,
        }
    }
}

fn location_text(file: &Path, line: Option<usize>) -> String {
    match line {
        Some(line) => format!("{}:{}", file.display(), line),
        None => file.display().to_string(),
    }
}
