use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;

use crate::loader::{Mapping, Node, SourceLocation};
use crate::types::SemanticKind;

/// A task-shaped mapping pulled out of a file, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTask {
    pub task: Mapping,
    pub kind: SemanticKind,
    /// Fields of the enclosing block owner, minus its task list.
    pub block_meta: Option<Mapping>,
}

impl RawTask {
    pub fn new(task: Mapping, kind: SemanticKind) -> Self {
        Self {
            task,
            kind,
            block_meta: None,
        }
    }

    pub fn with_block_meta(mut self, meta: Mapping) -> Self {
        if !meta.is_empty() {
            self.block_meta = Some(meta);
        }
        self
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.task.location()
    }

    pub fn has_any_key(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.task.contains_key(k))
    }
}

/// Canonical form of one automation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub module: String,
    pub arguments: IndexMap<String, Node>,
    pub raw_arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegate_to: Option<String>,
    pub kind: SemanticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    pub filename: PathBuf,
    /// Task fields other than the action itself (`name`, `when`, ...).
    pub fields: IndexMap<String, Node>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_meta: Option<Mapping>,
}

impl Action {
    pub fn line(&self) -> Option<usize> {
        self.location.as_ref().map(|l| l.line)
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Node::as_str)
    }

    /// Task name, or `module key=value ... raw args` when unnamed.
    pub fn describe(&self) -> String {
        if let Some(name) = self.name().filter(|n| !n.is_empty()) {
            return name.to_string();
        }

        let args: Vec<String> = self
            .arguments
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .chain(self.raw_arguments.iter().cloned())
            .collect();
        format!("{} {}", self.module, args.join(" "))
    }

    /// Rebuilds a task mapping with the module as its action key.
    ///
    /// Normalizing the result yields this action again.
    pub fn to_raw_task(&self) -> RawTask {
        let mut task = Mapping::new();
        task.set_location(self.location.clone());

        for (key, value) in &self.fields {
            task.insert(key.clone(), value.clone());
        }

        let mut args: Mapping = self
            .arguments
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !self.raw_arguments.is_empty() {
            args.insert("_raw_params", Node::String(self.raw_arguments.join(" ")));
        }
        task.insert(self.module.clone(), Node::Mapping(args));

        if let Some(delegate) = &self.delegate_to {
            task.insert("delegate_to", Node::String(delegate.clone()));
        }

        RawTask {
            task,
            kind: self.kind,
            block_meta: self.block_meta.clone(),
        }
    }
}
