//! Dead-code elimination by import reachability.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use walkdir::WalkDir;

use super::imports::{is_source_file, normalize, package_name, resolve_relative, scan_specifiers};
use super::DeadCodeEliminator;

/// Directory never scanned or pruned.
const NODE_MODULES: &str = "node_modules";

/// Native [`DeadCodeEliminator`] over a static import graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportGraphEliminator;

/// One source file in the graph.
#[derive(Debug)]
struct Module {
    path: PathBuf,
    /// Imports at least one package.
    imports_package: bool,
}

/// Import graph of every source file under a root.
pub struct ImportGraph {
    graph: DiGraph<Module, ()>,
    index: HashMap<PathBuf, NodeIndex>,
}

impl ImportGraph {
    /// Scan `source_root`, skipping `node_modules`.
    pub fn build(source_root: &Path) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        let walker = WalkDir::new(source_root)
            .into_iter()
            .filter_entry(|e| e.file_name() != NODE_MODULES);
        for entry in walker {
            let entry = entry.with_context(|| format!("failed to walk {}", source_root.display()))?;
            if entry.file_type().is_file() && is_source_file(entry.path()) {
                let path = normalize(entry.path());
                let node = graph.add_node(Module {
                    path: path.clone(),
                    imports_package: false,
                });
                index.insert(path, node);
            }
        }

        let nodes: Vec<NodeIndex> = graph.node_indices().collect();
        for node in nodes {
            let path = graph[node].path.clone();
            let source = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;

            for specifier in scan_specifiers(&source) {
                if package_name(&specifier).is_some() {
                    graph[node].imports_package = true;
                    continue;
                }
                let target = resolve_relative(&path, &specifier).and_then(|p| index.get(&p).copied());
                if let Some(target) = target {
                    graph.update_edge(node, target, ());
                }
            }
        }

        Ok(ImportGraph { graph, index })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    fn is_orphan(&self, node: NodeIndex) -> bool {
        !self.graph[node].imports_package
            && self.graph.neighbors_directed(node, Direction::Outgoing).next().is_none()
            && self.graph.neighbors_directed(node, Direction::Incoming).next().is_none()
    }

    /// Files that must be deleted when `root` is the entry point.
    pub fn unreachable_from(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let root = normalize(root);
        let Some(&root_node) = self.index.get(&root) else {
            bail!("root file {} is not part of the source tree", root.display());
        };

        let mut reachable = vec![false; self.graph.node_count()];
        let mut dfs = Dfs::new(&self.graph, root_node);
        while let Some(node) = dfs.next(&self.graph) {
            reachable[node.index()] = true;
        }

        let mut doomed: Vec<PathBuf> = self
            .graph
            .node_indices()
            .filter(|&node| node != root_node)
            .filter(|&node| {
                let module = &self.graph[node];
                if self.is_orphan(node) {
                    return true;
                }
                !reachable[node.index()] && !is_test_file(&module.path)
            })
            .map(|node| self.graph[node].path.clone())
            .collect();
        doomed.sort();
        Ok(doomed)
    }
}

impl DeadCodeEliminator for ImportGraphEliminator {
    fn eliminate(&self, source_root: &Path, root_file: &Path) -> Result<usize> {
        let graph = ImportGraph::build(source_root)?;
        let doomed = graph.unreachable_from(root_file)?;

        for path in &doomed {
            tracing::debug!("removing unreachable file {}", path.display());
            fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
        }

        tracing::debug!("{} of {} source files removed", doomed.len(), graph.len());
        Ok(doomed.len())
    }
}

/// `*.spec.*` and `*.test.*` files.
fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.contains(".spec.") || name.contains(".test."))
}
