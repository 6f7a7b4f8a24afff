//! Direct children of a single artifact

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::context::ResolutionContext;
use super::error::ResolveError;
use super::paths::{absolute, include_path, is_unresolved, path_dwim};
use crate::loader::{Mapping, Node};
use crate::tasks::keywords::{BLOCK_KEYS, INCLUDE_KEYS};
use crate::tasks::splitter::parse_kv;
use crate::types::{ArtifactKind, ArtifactRef, DependencyEdge};

/// Role references carrying this tag are not followed.
pub const SKIP_TAG: &str = "skip_ansible_later";

const TASK_LIST_KEYS: &[&str] = &["tasks", "pre_tasks", "post_tasks", "handlers", "block"];
const BARE_INCLUDE_KEYS: &[&str] = &["include", "import_playbook"];
const ROLE_KEYS: &[&str] = &["roles", "dependencies"];
const ROLE_IMPORT_KEYS: &[&str] = &["import_role", "include_role"];

/// Returns every artifact `entry` references directly.
///
/// A missing entry has no children. Children are reported in discovery order
/// and are not deduplicated.
pub fn find_children(
    entry: &ArtifactRef,
    context: &mut ResolutionContext,
) -> Result<Vec<DependencyEdge>, ResolveError> {
    let path = absolute(&entry.path);
    if !path.exists() {
        debug!("Skipping missing artifact {}", path.display());
        return Ok(Vec::new());
    }

    let content = match entry.kind {
        ArtifactKind::Role => role_entry(&path),
        _ => context.loader().load_file(&path)?,
    };
    let basedir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut finder = ChildFinder {
        context,
        file: path,
        basedir,
        parent: entry.kind,
        children: Vec::new(),
    };

    match entry.kind {
        ArtifactKind::Tasks | ArtifactKind::Handlers => {
            finder.register_library();
            let content = finder.context.render(&content, &finder.basedir);
            finder.task_list(entry.kind.as_str(), &content)?;
        }
        _ => {
            for play in plays(&content) {
                for (key, value) in play.iter() {
                    finder.dispatch(key, value)?;
                }
            }
        }
    }

    debug!(
        "Found {} children of {}",
        finder.children.len(),
        finder.file.display()
    );
    Ok(finder.children)
}

fn role_entry(path: &Path) -> Node {
    let mut reference = Mapping::new();
    reference.insert("role", Node::string(path.display().to_string()));
    let mut content = Mapping::new();
    content.insert("roles", Node::Sequence(vec![Node::Mapping(reference)]));
    Node::Mapping(content)
}

fn plays(content: &Node) -> Vec<&Mapping> {
    match content {
        Node::Mapping(play) => vec![play],
        Node::Sequence(items) => items.iter().filter_map(Node::as_mapping).collect(),
        _ => Vec::new(),
    }
}

fn is_falsy(node: &Node) -> bool {
    match node {
        Node::Null => true,
        Node::Bool(b) => !b,
        Node::String(s) => s.is_empty(),
        Node::Sequence(items) => items.is_empty(),
        Node::Mapping(mapping) => mapping.is_empty(),
        Node::Int(i) => *i == 0,
        Node::Float(f) => *f == 0.0,
    }
}

fn has_skip_tag(reference: &Mapping) -> bool {
    match reference.get("tags") {
        Some(Node::String(tags)) => tags.split(',').any(|t| t.trim() == SKIP_TAG),
        Some(Node::Sequence(tags)) => tags.iter().any(|t| t.as_str() == Some(SKIP_TAG)),
        _ => false,
    }
}

struct ChildFinder<'c> {
    context: &'c mut ResolutionContext,
    file: PathBuf,
    basedir: PathBuf,
    parent: ArtifactKind,
    children: Vec<DependencyEdge>,
}

impl ChildFinder<'_> {
    fn dispatch(&mut self, key: &str, value: &Node) -> Result<(), ResolveError> {
        self.register_library();

        if is_falsy(value) {
            return Ok(());
        }

        if TASK_LIST_KEYS.contains(&key) {
            let value = self.context.render(value, &self.basedir);
            self.task_list(key, &value)
        } else if BARE_INCLUDE_KEYS.contains(&key) {
            let value = self.context.render(value, &self.basedir);
            if let Some(text) = value.scalar_text() {
                self.include(&text, self.parent);
            }
            Ok(())
        } else if ROLE_KEYS.contains(&key) {
            let value = self.context.render(value, &self.basedir);
            self.roles(&value)
        } else {
            Ok(())
        }
    }

    fn register_library(&mut self) {
        let library = self.basedir.join("library");
        self.context.register_module_dir(&library);
    }

    fn structural(&self, reason: String) -> ResolveError {
        ResolveError::Structural {
            file: self.file.clone(),
            reason,
        }
    }

    /// Walks the items of a task list declared under `section`.
    fn task_list(&mut self, section: &str, value: &Node) -> Result<(), ResolveError> {
        let Some(items) = value.as_sequence() else {
            if !value.is_null() {
                warn!(
                    "Ignoring non-list '{}' section in {}",
                    section,
                    self.file.display()
                );
            }
            return Ok(());
        };

        let kind = match self.parent {
            ArtifactKind::Playbook => ArtifactKind::for_section(section),
            parent => parent,
        };

        for task in items.iter().filter_map(Node::as_mapping) {
            if let Some(value) = INCLUDE_KEYS.iter().find_map(|k| task.get(k)) {
                let target = match value {
                    Node::Mapping(options) => options.get("file").and_then(Node::scalar_text),
                    other => other.scalar_text(),
                };
                if let Some(target) = target {
                    self.include(&target, kind);
                }
            } else if let Some(value) = ROLE_IMPORT_KEYS.iter().find_map(|k| task.get(k)) {
                self.role_import(value)?;
            } else if task.contains_key("block") {
                for key in BLOCK_KEYS {
                    match task.get(key) {
                        None | Some(Node::Null) => {}
                        Some(nested @ Node::Sequence(_)) => self.task_list(section, nested)?,
                        Some(other) => {
                            return Err(self.structural(format!(
                                "key '{}' defined, but bad value: '{}'",
                                key, other
                            )))
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn include(&mut self, value: &str, kind: ArtifactKind) {
        if is_unresolved(value) {
            debug!("Skipping unresolved include '{}' in {}", value, self.file.display());
            return;
        }
        let Some(target) = include_path(value) else {
            return;
        };

        let mut resolved = path_dwim(&self.basedir, &target);
        if !resolved.exists() && !self.basedir.ends_with("tasks") {
            let sibling = path_dwim(&self.basedir.join("..").join("tasks"), &target);
            if sibling.exists() {
                resolved = sibling;
            }
        }

        debug!("Discovered {} {}", kind, resolved.display());
        self.children.push(DependencyEdge::new(resolved, kind));
    }

    fn roles(&mut self, value: &Node) -> Result<(), ResolveError> {
        let references = match value {
            Node::Sequence(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };

        for reference in references {
            match reference {
                Node::Mapping(options) => {
                    let name = options
                        .get("role")
                        .or_else(|| options.get("name"))
                        .and_then(Node::scalar_text)
                        .ok_or_else(|| {
                            self.structural(format!(
                                "role dict {} does not contain a 'role' or 'name' key",
                                reference
                            ))
                        })?;
                    if has_skip_tag(options) {
                        info!("Skipping role '{}' tagged {}", name, SKIP_TAG);
                        continue;
                    }
                    self.role_files(&name, "main");
                }
                Node::Sequence(_) => {
                    return Err(self.structural(format!("invalid role reference: {}", reference)))
                }
                scalar => {
                    if let Some(name) = scalar.scalar_text() {
                        self.role_files(&name, "main");
                    }
                }
            }
        }

        Ok(())
    }

    fn role_import(&mut self, value: &Node) -> Result<(), ResolveError> {
        let options: Mapping = match value {
            Node::Mapping(options) => options.clone(),
            Node::String(text) => parse_kv(text, false).into_iter().collect(),
            other => {
                return Err(self.structural(format!(
                    "role import must be a mapping or k=v string: '{}'",
                    other
                )))
            }
        };
        let name = options
            .get_str("name")
            .ok_or_else(|| self.structural(format!("role import {} has no 'name'", value)))?
            .to_string();
        let main = options
            .get("tasks_from")
            .and_then(Node::scalar_text)
            .unwrap_or_else(|| "main".to_string());

        self.role_files(&name, &main);
        Ok(())
    }

    /// Emits the tasks, handlers and meta entry files of role `name`.
    fn role_files(&mut self, name: &str, main: &str) {
        if is_unresolved(name) {
            debug!("Skipping unresolved role '{}'", name);
            return;
        }
        let Some(role_dir) = self.role_path(name) else {
            debug!("Role '{}' not found from {}", name, self.basedir.display());
            return;
        };

        for (section, kind) in [
            ("tasks", ArtifactKind::Tasks),
            ("handlers", ArtifactKind::Handlers),
            ("meta", ArtifactKind::Meta),
        ] {
            let found = ["yml", "yaml"]
                .iter()
                .map(|ext| role_dir.join(section).join(format!("{}.{}", main, ext)))
                .find(|candidate| candidate.exists());
            if let Some(file) = found {
                debug!("Discovered {} {}", kind, file.display());
                self.children.push(DependencyEdge::new(file, kind));
            }
        }
    }

    fn role_path(&mut self, name: &str) -> Option<PathBuf> {
        let basedir = &self.basedir;
        let mut candidates = vec![
            path_dwim(basedir, &format!("roles/{}", name)),
            path_dwim(basedir, name),
            path_dwim(basedir, &format!("../../../roles/{}", name)),
            path_dwim(basedir, &format!("../../{}", name)),
        ];
        candidates.extend(
            self.context
                .roles_path()
                .iter()
                .map(|location| path_dwim(location, name)),
        );

        let role_dir = candidates.into_iter().find(|c| c.is_dir())?;
        self.context.register_module_dir(&role_dir.join("library"));
        Some(role_dir)
    }
}
