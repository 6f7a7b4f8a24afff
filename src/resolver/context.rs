//! State threaded through a resolution run

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::loader::{Mapping, Node, YamlLoader};
use crate::template::{is_template, HandlebarsTemplar, TemplateRenderer};

use super::paths::expand_home;

/// Directories holding custom modules, and the module names found in them.
#[derive(Debug, Clone, Default)]
pub struct ModuleSearchPath {
    dirs: Vec<PathBuf>,
    names: BTreeSet<String>,
}

impl ModuleSearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `dir` and indexes its module files. Returns false when the
    /// directory was already registered.
    pub fn register(&mut self, dir: &Path) -> bool {
        if self.dirs.iter().any(|d| d == dir) {
            return false;
        }

        let before = self.names.len();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !stem.starts_with('_') && !stem.starts_with('.') {
                self.names.insert(stem.to_string());
            }
        }

        info!(
            "Registered module directory {} ({} modules)",
            dir.display(),
            self.names.len() - before
        );
        self.dirs.push(dir.to_path_buf());
        true
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn contains(&self, module: &str) -> bool {
        self.names.contains(module)
    }
}

/// Everything a resolution run reads or accumulates besides the files
/// themselves.
pub struct ResolutionContext {
    roles_path: Vec<PathBuf>,
    module_search_path: ModuleSearchPath,
    variables: Map<String, Value>,
    templar: Box<dyn TemplateRenderer>,
    loader: YamlLoader,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self {
            roles_path: Vec::new(),
            module_search_path: ModuleSearchPath::new(),
            variables: Map::new(),
            templar: Box::new(HandlebarsTemplar::new()),
            loader: YamlLoader::new(),
        }
    }

    /// Sets the configured role search locations; `~` is expanded.
    pub fn with_roles_path<I, P>(mut self, roles_path: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.roles_path = roles_path
            .into_iter()
            .map(|p| expand_home(p.as_ref()))
            .collect();
        self
    }

    /// Extra variables available to templated include paths.
    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_templar(mut self, templar: impl TemplateRenderer + 'static) -> Self {
        self.templar = Box::new(templar);
        self
    }

    pub fn with_loader(mut self, loader: YamlLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn roles_path(&self) -> &[PathBuf] {
        &self.roles_path
    }

    pub fn module_search_path(&self) -> &ModuleSearchPath {
        &self.module_search_path
    }

    pub fn loader(&self) -> &YamlLoader {
        &self.loader
    }

    /// Registers `dir` as a module search directory if it exists.
    pub fn register_module_dir(&mut self, dir: &Path) {
        if dir.is_dir() {
            self.module_search_path.register(dir);
        }
    }

    /// Renders every templated string in `node`, with `playbook_dir` bound to
    /// `basedir`. Strings that fail to render are kept as written.
    pub fn render(&self, node: &Node, basedir: &Path) -> Node {
        let mut variables = self.variables.clone();
        variables.insert(
            "playbook_dir".to_string(),
            Value::String(basedir.display().to_string()),
        );
        let variables = Value::Object(variables);
        self.render_node(node, &variables)
    }

    fn render_node(&self, node: &Node, variables: &Value) -> Node {
        match node {
            Node::String(text) if is_template(text) => match self.templar.render(text, variables) {
                Some(rendered) => Node::String(rendered),
                None => {
                    debug!("Leaving '{}' unrendered", text);
                    node.clone()
                }
            },
            Node::Sequence(items) => Node::Sequence(
                items
                    .iter()
                    .map(|item| self.render_node(item, variables))
                    .collect(),
            ),
            Node::Mapping(mapping) => {
                let mut rendered: Mapping = mapping
                    .iter()
                    .map(|(k, v)| (k.to_string(), self.render_node(v, variables)))
                    .collect();
                rendered.set_location(mapping.location().cloned());
                Node::Mapping(rendered)
            }
            other => other.clone(),
        }
    }
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self::new()
    }
}
