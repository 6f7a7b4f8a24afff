//! Transitive resolution of an entry point into a dependency graph

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::children::find_children;
use super::context::ResolutionContext;
use super::error::ResolveError;
use super::paths::absolute;
use crate::loader::LoaderError;
use crate::types::{ArtifactRef, DependencyEdge};

/// Every artifact reachable from an entry point.
#[derive(Debug)]
pub struct DependencyGraph {
    root: ArtifactRef,
    graph: DiGraph<ArtifactRef, ()>,
    indices: HashMap<PathBuf, NodeIndex>,
    edges: Vec<DependencyEdge>,
    load_errors: Vec<LoaderError>,
}

impl DependencyGraph {
    fn new(root: ArtifactRef) -> Self {
        let mut graph = Self {
            root: root.clone(),
            graph: DiGraph::new(),
            indices: HashMap::new(),
            edges: Vec::new(),
            load_errors: Vec::new(),
        };
        graph.node(&root);
        graph
    }

    fn node(&mut self, artifact: &ArtifactRef) -> NodeIndex {
        if let Some(index) = self.indices.get(&artifact.path) {
            return *index;
        }
        let index = self.graph.add_node(artifact.clone());
        self.indices.insert(artifact.path.clone(), index);
        index
    }

    pub fn root(&self) -> &ArtifactRef {
        &self.root
    }

    /// Every discovered edge, in discovery order, duplicates included.
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn into_edges(self) -> Vec<DependencyEdge> {
        self.edges
    }

    /// Files that could not be read or parsed. They contribute no children.
    pub fn load_errors(&self) -> &[LoaderError] {
        &self.load_errors
    }

    pub fn take_load_errors(&mut self) -> Vec<LoaderError> {
        std::mem::take(&mut self.load_errors)
    }

    /// Distinct artifacts in the order they were first seen, root first.
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactRef> {
        self.graph.node_indices().map(|index| &self.graph[index])
    }

    /// Distinct direct children of the artifact at `path`.
    pub fn children_of(&self, path: &Path) -> Vec<&ArtifactRef> {
        let Some(index) = self.indices.get(path) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        self.graph
            .neighbors(*index)
            .collect::<Vec<_>>()
            .into_iter()
            // petgraph walks neighbors newest first
            .rev()
            .filter(|child| seen.insert(*child))
            .map(|child| &self.graph[child])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    fn check_acyclic(&self) -> Result<(), ResolveError> {
        let Err(cycle) = toposort(&self.graph, None) else {
            return Ok(());
        };

        let start = cycle.node_id();
        let chain = tarjan_scc(&self.graph)
            .into_iter()
            .find(|component| component.contains(&start))
            .unwrap_or_else(|| vec![start])
            .into_iter()
            .map(|index| self.graph[index].path.clone())
            .collect();

        Err(ResolveError::Cycle { chain })
    }
}

/// Resolves `entry` and everything it transitively references.
///
/// Each artifact is expanded once, no matter how many parents reference it.
/// A file that fails to load is recorded in the graph and resolution goes on
/// with its siblings. An artifact that (indirectly) includes itself and a
/// structurally malformed artifact are errors.
pub fn resolve_all(
    entry: &ArtifactRef,
    context: &mut ResolutionContext,
) -> Result<DependencyGraph, ResolveError> {
    let root = ArtifactRef::new(absolute(&entry.path), entry.kind);
    info!("Resolving {}", root);

    let mut graph = DependencyGraph::new(root.clone());
    let mut expanded = HashSet::new();
    let mut pending = vec![root];

    while let Some(current) = pending.pop() {
        if !expanded.insert(current.path.clone()) {
            continue;
        }

        let parent = graph.node(&current);
        let children = match find_children(&current, context) {
            Ok(children) => children,
            Err(ResolveError::Load(error)) => {
                warn!("{}", error);
                graph.load_errors.push(error);
                continue;
            }
            Err(e) => return Err(e),
        };
        for child in &children {
            let index = graph.node(child);
            graph.graph.add_edge(parent, index, ());
        }

        graph.edges.extend(children.iter().cloned());
        // depth first, in declaration order
        pending.extend(children.into_iter().rev());
    }

    graph.check_acyclic()?;

    debug!(
        "Resolved {} artifacts and {} edges",
        graph.len(),
        graph.edges.len()
    );
    Ok(graph)
}
