//! Flattens a parsed file into the raw tasks it declares

use std::path::Path;
use tracing::{debug, warn};

use super::action::RawTask;
use super::error::ExtractError;
use super::keywords::{BLOCK_KEYS, INCLUDE_KEYS};
use crate::loader::{Mapping, Node};
use crate::types::{ArtifactKind, ArtifactRef, SemanticKind};

/// Play keys holding task lists, in extraction order.
const PLAY_TASK_KEYS: &[&str] = &["tasks", "handlers", "pre_tasks", "post_tasks"];

/// Returns every actionable task in `content`, in declaration order followed
/// by the contents of `block`/`rescue`/`always` sections.
///
/// Block owners and include directives are structural and are left out.
pub fn extract_actions(content: &Node, file: &ArtifactRef) -> Result<Vec<RawTask>, ExtractError> {
    let path = file.path.as_path();

    let mut tasks = match file.kind {
        ArtifactKind::Tasks => top_level_tasks(content, SemanticKind::Task, path)?,
        ArtifactKind::Handlers => top_level_tasks(content, SemanticKind::Handler, path)?,
        ArtifactKind::Playbook | ArtifactKind::Role | ArtifactKind::Meta => {
            let mut tasks = Vec::new();
            for play in plays(content) {
                for key in PLAY_TASK_KEYS {
                    tasks.extend(task_list(play, key, path)?);
                }
            }
            tasks
        }
    };

    // Children are appended while walking, so nested blocks of any depth
    // are reached.
    let mut index = 0;
    while index < tasks.len() {
        let mut children = Vec::new();
        for key in BLOCK_KEYS {
            children.extend(task_list(&tasks[index].task, key, path)?);
        }
        tasks.extend(children);
        index += 1;
    }

    let total = tasks.len();
    tasks.retain(|t| !t.has_any_key(BLOCK_KEYS) && !t.has_any_key(INCLUDE_KEYS));
    debug!(
        "Extracted {} of {} task entries from {}",
        tasks.len(),
        total,
        path.display()
    );

    Ok(tasks)
}

fn plays(content: &Node) -> Vec<&Mapping> {
    match content {
        Node::Mapping(play) => vec![play],
        Node::Sequence(items) => items.iter().filter_map(Node::as_mapping).collect(),
        _ => Vec::new(),
    }
}

fn top_level_tasks(content: &Node, kind: SemanticKind, path: &Path) -> Result<Vec<RawTask>, ExtractError> {
    match content {
        Node::Sequence(items) => Ok(mappings(items, path)
            .map(|task| RawTask::new(task.clone(), kind))
            .collect()),
        Node::Null => Ok(Vec::new()),
        other => Err(ExtractError::Structural {
            file: path.to_path_buf(),
            key: kind.to_string(),
            value: other.to_string(),
        }),
    }
}

fn mappings<'a>(items: &'a [Node], path: &'a Path) -> impl Iterator<Item = &'a Mapping> {
    items.iter().filter_map(move |item| {
        let mapping = item.as_mapping();
        if mapping.is_none() {
            warn!("Ignoring non-mapping task entry '{}' in {}", item, path.display());
        }
        mapping
    })
}

/// Items listed under `key` of `owner`, tagged by the key's semantic kind.
/// Each carries a snapshot of the owner's other fields: the play for play
/// sections, the block task for block sections.
fn task_list(owner: &Mapping, key: &str, path: &Path) -> Result<Vec<RawTask>, ExtractError> {
    let items = match owner.get(key) {
        None | Some(Node::Null) => return Ok(Vec::new()),
        Some(Node::Sequence(items)) => items,
        Some(other) => {
            return Err(ExtractError::Structural {
                file: path.to_path_buf(),
                key: key.to_string(),
                value: other.to_string(),
            })
        }
    };

    let kind = SemanticKind::for_block_key(key).unwrap_or_default();
    let mut meta = owner.clone();
    meta.remove(key);
    meta.set_location(None);

    Ok(mappings(items, path)
        .map(|task| RawTask::new(task.clone(), kind).with_block_meta(meta.clone()))
        .collect())
}
