//! End-to-end pass: resolve an entry point, then extract and normalize the
//! actions of every artifact it reaches.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{is_excluded, Config, ConfigError};
use crate::loader::LoaderError;
use crate::resolver::{resolve_all, ResolveError};
use crate::tasks::{extract_actions, Action, ExtractError, NormalizeError, TaskNormalizer};
use crate::types::{Artifact, ArtifactKind, ArtifactRef, DependencyEdge};

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Everything found for one entry point.
#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub edges: Vec<DependencyEdge>,
    pub actions: Vec<Action>,
    #[serde(skip)]
    pub errors: Vec<CollectError>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: Report) {
        self.edges.extend(other.edges);
        self.actions.extend(other.actions);
        self.errors.extend(other.errors);
    }
}

pub struct ActionCollector {
    config: Config,
    exclude: Vec<Regex>,
}

impl ActionCollector {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let exclude = config.exclude_matchers()?;
        Ok(Self { config, exclude })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Collects the actions reachable from `entry`.
    ///
    /// A structural or cyclic resolution failure ends the run for this
    /// entry. Load, extraction and normalization failures are recorded and
    /// the remaining files and tasks are still processed.
    pub fn collect(&self, entry: &ArtifactRef) -> Report {
        let mut report = Report::default();
        let mut context = self.config.resolution_context();

        let mut graph = match resolve_all(entry, &mut context) {
            Ok(graph) => graph,
            Err(e) => {
                warn!("Failed to resolve {}: {}", entry, e);
                report.errors.push(e.into());
                return report;
            }
        };

        let load_errors = graph.take_load_errors();
        let failed: HashSet<PathBuf> = load_errors.iter().map(|e| e.file().to_path_buf()).collect();
        report.errors.extend(load_errors.into_iter().map(CollectError::from));

        let normalizer = TaskNormalizer::new(
            self.config
                .builtin_modules()
                .with_search_path(context.module_search_path()),
        );

        let artifacts: Vec<ArtifactRef> = graph
            .artifacts()
            .filter(|a| a.kind != ArtifactKind::Role && a.path.is_file())
            .filter(|a| !failed.contains(&a.path))
            .cloned()
            .collect();
        report.edges = graph.into_edges();

        for reference in artifacts {
            if is_excluded(&reference.path, &self.exclude) {
                debug!("Excluded {}", reference.path.display());
                continue;
            }

            let artifact = match Artifact::load(&reference, context.loader()) {
                Ok(artifact) => artifact,
                Err(e) => {
                    warn!("{}", e);
                    report.errors.push(e.into());
                    continue;
                }
            };

            let tasks = match extract_actions(&artifact.content, &reference) {
                Ok(tasks) => tasks,
                Err(e) => {
                    warn!("{}", e);
                    report.errors.push(e.into());
                    continue;
                }
            };

            for raw in tasks {
                match normalizer.normalize(raw, &artifact.path) {
                    Ok(action) => report.actions.push(action),
                    Err(e) => {
                        warn!("{}", e);
                        report.errors.push(e.into());
                    }
                }
            }
        }

        info!(
            "Collected {} actions from {} ({} errors)",
            report.actions.len(),
            entry.path.display(),
            report.errors.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn collector() -> ActionCollector {
        let mut config = Config::default();
        config.ansible.roles_path.clear();
        ActionCollector::new(config).unwrap()
    }

    #[test]
    fn test_collects_entry_and_children() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "tasks/extra.yml", "- name: extra\n  ping:\n");
        let site = write(
            root,
            "site.yml",
            "- hosts: all\n  tasks:\n    - debug: msg=hello\n    - include_tasks: tasks/extra.yml\n",
        );

        let report = collector().collect(&ArtifactRef::playbook(&site));

        assert!(report.is_clean(), "{:?}", report.errors);
        assert_eq!(report.edges.len(), 1);
        let modules: Vec<&str> = report.actions.iter().map(|a| a.module.as_str()).collect();
        assert_eq!(modules, vec!["debug", "ping"]);
        assert_eq!(report.actions[1].filename, root.join("tasks/extra.yml"));
    }

    #[test]
    fn test_grammar_errors_recorded_and_processing_continues() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let site = write(
            root,
            "site.yml",
            "- hosts: all\n  tasks:\n    - first_unknown: x=1\n      second_unknown: y=2\n    - ping:\n    - copy: src=a\n      debug: msg=b\n",
        );

        let report = collector().collect(&ArtifactRef::playbook(&site));

        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.errors.len(), 2);
        assert!(report
            .errors
            .iter()
            .all(|e| matches!(e, CollectError::Normalize(_))));
    }

    #[test]
    fn test_syntax_error_in_child_recorded_and_siblings_collected() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "good.yml", "- name: from good\n  debug: msg=ok\n");
        write(root, "broken.yml", "- ping: [unclosed\n");
        let site = write(
            root,
            "site.yml",
            "- hosts: all\n  tasks:\n    - ping:\n    - include_tasks: good.yml\n    - include_tasks: broken.yml\n",
        );

        let report = collector().collect(&ArtifactRef::playbook(&site));

        assert_eq!(report.edges.len(), 2);
        let modules: Vec<&str> = report.actions.iter().map(|a| a.module.as_str()).collect();
        assert_eq!(modules, vec!["ping", "debug"]);
        match &report.errors[..] {
            [CollectError::Load(LoaderError::Syntax { file, .. })] => {
                assert_eq!(file, &root.join("broken.yml"))
            }
            other => panic!("Expected one syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_excluded_files_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "vendor/x.yml", "- ping:\n");
        let site = write(
            root,
            "site.yml",
            "- hosts: all\n  tasks:\n    - include_tasks: vendor/x.yml\n",
        );

        let mut config = Config::from_yaml("rules:\n  exclude_files: [vendor]\n").unwrap();
        config.ansible.roles_path.clear();
        let report = ActionCollector::new(config)
            .unwrap()
            .collect(&ArtifactRef::playbook(&site));

        assert_eq!(report.edges.len(), 1);
        assert!(report.actions.is_empty());
    }

    #[test]
    fn test_library_module_accepted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "library/site_probe.py", "");
        let site = write(root, "site.yml", "- hosts: all\n  tasks:\n    - site_probe: depth=2\n");

        let report = collector().collect(&ArtifactRef::playbook(&site));

        assert!(report.is_clean(), "{:?}", report.errors);
        assert_eq!(report.actions[0].module, "site_probe");
    }
}
