//! Task extraction and normalization

pub mod action;
pub mod error;
pub mod extractor;
pub mod grammar;
pub mod keywords;
pub mod normalizer;
pub mod splitter;

pub use action::{Action, RawTask};
pub use error::{ExtractError, GrammarError, NormalizeError};
pub use extractor::extract_actions;
pub use grammar::{ActionForm, AnsibleModuleArgs, BuiltinModules, ModuleArgsGrammar, ParsedArgs};
pub use normalizer::{normalize_task, TaskNormalizer};
