//! Collapses raw tasks into canonical [`Action`] records

use indexmap::IndexMap;
use std::path::Path;
use tracing::debug;

use super::action::{Action, RawTask};
use super::error::NormalizeError;
use super::grammar::{AnsibleModuleArgs, BuiltinModules, ModuleArgsGrammar};
use crate::loader::Node;

/// Keys consumed by the grammar and never carried through as task fields.
const CONSUMED_KEYS: &[&str] = &["action", "local_action", "args", "delegate_to"];

/// Normalizes raw tasks through a module-argument grammar.
pub struct TaskNormalizer<G = AnsibleModuleArgs> {
    grammar: G,
    builtins: BuiltinModules,
}

impl TaskNormalizer<AnsibleModuleArgs> {
    pub fn new(builtins: BuiltinModules) -> Self {
        Self::with_grammar(AnsibleModuleArgs::new(), builtins)
    }
}

impl Default for TaskNormalizer<AnsibleModuleArgs> {
    fn default() -> Self {
        Self::new(BuiltinModules::default())
    }
}

impl<G: ModuleArgsGrammar> TaskNormalizer<G> {
    pub fn with_grammar(grammar: G, builtins: BuiltinModules) -> Self {
        Self { grammar, builtins }
    }

    pub fn builtins(&self) -> &BuiltinModules {
        &self.builtins
    }

    pub fn normalize(&self, raw: RawTask, filename: &Path) -> Result<Action, NormalizeError> {
        let RawTask {
            task,
            kind,
            block_meta,
        } = raw;
        let location = task.location().cloned();

        let parsed = self
            .grammar
            .parse(&task, &self.builtins)
            .map_err(|source| NormalizeError::Grammar {
                file: filename.to_path_buf(),
                line: location.as_ref().map(|l| l.line),
                source,
            })?;

        let mut module = parsed.module;
        let mut arguments = parsed.arguments;

        if arguments.shift_remove("_uses_shell").is_some() {
            module = "shell".to_string();
        }

        let fields: IndexMap<String, Node> = task
            .into_iter()
            .filter(|(k, _)| !CONSUMED_KEYS.contains(&k.as_str()) && *k != module)
            .collect();

        let raw_arguments = match arguments.shift_remove("_raw_params") {
            Some(raw) => raw
                .scalar_text()
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        debug!(
            "Normalized task at {}:{} to module '{}'",
            filename.display(),
            location.as_ref().map(|l| l.line).unwrap_or_default(),
            module
        );

        Ok(Action {
            module,
            arguments,
            raw_arguments,
            delegate_to: parsed.delegate_to,
            kind,
            location,
            filename: filename.to_path_buf(),
            fields,
            block_meta: block_meta.filter(|m| !m.is_empty()),
        })
    }
}

/// Normalizes one task with the default grammar.
pub fn normalize_task<S: AsRef<str>>(
    raw: RawTask,
    filename: &Path,
    custom_modules: &[S],
) -> Result<Action, NormalizeError> {
    TaskNormalizer::new(BuiltinModules::new(custom_modules)).normalize(raw, filename)
}
