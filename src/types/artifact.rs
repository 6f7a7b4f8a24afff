use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::loader::{LoaderError, Node, YamlLoader};

/// Kind of file an artifact is, which decides how it is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Playbook,
    Role,
    Tasks,
    Handlers,
    Meta,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Playbook => "playbook",
            ArtifactKind::Role => "role",
            ArtifactKind::Tasks => "tasks",
            ArtifactKind::Handlers => "handlers",
            ArtifactKind::Meta => "meta",
        }
    }

    /// Kind of the files a playbook section includes.
    pub fn for_section(section: &str) -> Self {
        match section {
            "handlers" => ArtifactKind::Handlers,
            _ => ArtifactKind::Tasks,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Functional category of a flattened action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticKind {
    #[default]
    Task,
    Handler,
    Meta,
}

impl SemanticKind {
    /// Maps the key that owns a task list to the kind of its items.
    pub fn for_block_key(key: &str) -> Option<Self> {
        match key {
            "tasks" | "pre_tasks" | "post_tasks" => Some(SemanticKind::Task),
            "handlers" => Some(SemanticKind::Handler),
            "block" | "rescue" | "always" => Some(SemanticKind::Meta),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticKind::Task => "task",
            SemanticKind::Handler => "handler",
            SemanticKind::Meta => "meta",
        }
    }
}

impl fmt::Display for SemanticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file reference together with the kind it should be read as.
///
/// Entry points and discovered children share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

/// A reference discovered by the resolver.
pub type DependencyEdge = ArtifactRef;

impl ArtifactRef {
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn playbook(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ArtifactKind::Playbook)
    }

    pub fn role(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ArtifactKind::Role)
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.kind)
    }
}

/// A loaded file.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub content: Node,
}

impl Artifact {
    pub fn load(reference: &ArtifactRef, loader: &YamlLoader) -> Result<Self, LoaderError> {
        let content = loader.load_file(&reference.path)?;
        Ok(Self {
            path: reference.path.clone(),
            kind: reference.kind,
            content,
        })
    }

    pub fn role_name(&self) -> Option<&str> {
        role_name(&self.path)
    }
}

/// Name of the role a file belongs to: the path segment following `roles/`.
pub fn role_name(path: &Path) -> Option<&str> {
    let mut components = path.components().map(|c| c.as_os_str().to_str());
    while let Some(component) = components.next() {
        if component == Some("roles") {
            let role = components.next()??;
            // a bare roles/<name> path has no file below the role
            return components.next().map(|_| role);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name() {
        assert_eq!(role_name(Path::new("site/roles/web/tasks/main.yml")), Some("web"));
        assert_eq!(role_name(Path::new("/abs/roles/db/meta/main.yml")), Some("db"));
        assert_eq!(role_name(Path::new("playbooks/site.yml")), None);
        assert_eq!(role_name(Path::new("roles/web")), None);
    }

    #[test]
    fn test_semantic_kind_for_block_key() {
        assert_eq!(SemanticKind::for_block_key("pre_tasks"), Some(SemanticKind::Task));
        assert_eq!(SemanticKind::for_block_key("handlers"), Some(SemanticKind::Handler));
        assert_eq!(SemanticKind::for_block_key("rescue"), Some(SemanticKind::Meta));
        assert_eq!(SemanticKind::for_block_key("vars"), None);
    }
}
