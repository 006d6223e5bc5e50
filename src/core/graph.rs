//! LM-004: Dependency graph construction and topological ordering.
//!
//! Nodes are append-only: once added, a logical id can be neither removed nor
//! renamed. Edges may name nodes that do not exist yet; they are resolved
//! only when the graph is validated. Validation computes the emission order
//! using Kahn's algorithm with deterministic (alphabetical) tie-breaking.

use super::error::GraphError;
use super::identifier::validate_logical_id;
use super::types::ResourceNode;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};

/// Logical resources and the `dependsOn` edges between them.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: IndexMap<String, ResourceNode>,
    /// `(from, to)`: `from` requires `to` to exist first.
    edges: Vec<(String, String)>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Fails on an illegal or already-present logical id.
    pub fn add_node(&mut self, node: ResourceNode) -> Result<(), GraphError> {
        validate_logical_id(&node.id)?;
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateIdentifier { id: node.id });
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Record that `from` depends on `to`. Endpoints are checked by
    /// [`validate`](Self::validate), not here.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let edge = (from.into(), to.into());
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Everything `id` depends on: its own `depends_on` first, then edges,
    /// without duplicates.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        let mut deps: Vec<&str> = Vec::new();
        let own = self.nodes.get(id).map(|n| n.depends_on.as_slice()).unwrap_or(&[]);
        let extra = self
            .edges
            .iter()
            .filter(|(from, _)| from == id)
            .map(|(_, to)| to);
        for dep in own.iter().chain(extra) {
            if !deps.contains(&dep.as_str()) {
                deps.push(dep);
            }
        }
        deps
    }

    /// Resolve every edge and return an order in which each node follows all
    /// of its dependencies.
    ///
    /// Pure over the current nodes and edges: calling it twice on an
    /// unmodified graph returns the same order.
    pub fn validate(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

        // Initialize
        for id in self.nodes.keys() {
            in_degree.insert(id, 0);
            adjacency.insert(id, Vec::new());
        }

        // Resolve edges: node-declared first, then graph-level
        for (from, to) in self.all_edges() {
            if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
                let missing = if self.nodes.contains_key(from) { to } else { from };
                return Err(GraphError::UnknownNode {
                    from: from.to_string(),
                    to: to.to_string(),
                    missing: missing.to_string(),
                });
            }
            if let Some(dependents) = adjacency.get_mut(to) {
                dependents.push(from);
            }
            if let Some(degree) = in_degree.get_mut(from) {
                *degree += 1;
            }
        }

        // Kahn's algorithm with sorted tie-breaking
        let mut zero_degree: Vec<&str> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(id, _)| *id)
            .collect();
        zero_degree.sort_unstable();
        let mut queue: VecDeque<&str> = zero_degree.into_iter().collect();

        let mut order: Vec<String> = Vec::with_capacity(self.nodes.len());
        while let Some(current) = queue.pop_front() {
            order.push(current.to_string());

            let mut next_ready: Vec<&str> = Vec::new();
            if let Some(dependents) = adjacency.get(current) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            next_ready.push(dependent);
                        }
                    }
                }
            }
            next_ready.sort_unstable();
            queue.extend(next_ready);
        }

        if order.len() != self.nodes.len() {
            let ordered: HashSet<&str> = order.iter().map(String::as_str).collect();
            return Err(GraphError::CyclicDependency {
                cycle: self.find_cycle(&ordered),
            });
        }

        Ok(order)
    }

    /// Unique `(from, to)` pairs from node declarations and graph edges.
    fn all_edges(&self) -> Vec<(&str, &str)> {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        let declared = self
            .nodes
            .values()
            .flat_map(|n| n.depends_on.iter().map(move |d| (n.id.as_str(), d.as_str())));
        let extra = self.edges.iter().map(|(f, t)| (f.as_str(), t.as_str()));
        declared
            .chain(extra)
            .filter(|edge| seen.insert(*edge))
            .collect()
    }

    /// Walk dependencies among the unordered nodes until one repeats.
    ///
    /// Every node Kahn's algorithm could not order still has an unordered
    /// dependency, so the walk always closes a cycle. It starts at the
    /// alphabetically smallest unordered node and follows the smallest
    /// unordered dependency, which keeps the reported cycle deterministic.
    fn find_cycle(&self, ordered: &HashSet<&str>) -> Vec<String> {
        let mut stuck: Vec<&str> = self
            .nodes
            .keys()
            .map(String::as_str)
            .filter(|id| !ordered.contains(id))
            .collect();
        stuck.sort_unstable();
        let Some(&start) = stuck.first() else {
            return Vec::new();
        };

        let mut path: Vec<&str> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();
        let mut current = start;
        loop {
            if let Some(&at) = position.get(current) {
                return path[at..].iter().map(|s| s.to_string()).collect();
            }
            position.insert(current, path.len());
            path.push(current);

            let mut next: Vec<&str> = self
                .dependencies_of(current)
                .into_iter()
                .filter(|d| !ordered.contains(d))
                .collect();
            next.sort_unstable();
            match next.first() {
                Some(&dep) => current = dep,
                None => return path.iter().map(|s| s.to_string()).collect(),
            }
        }
    }
}

/// Saved graph size; rolling back to it discards everything added since.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Checkpoint {
    nodes: usize,
    edges: usize,
}

/// The in-progress template handed to decorators.
///
/// Only appends are possible through this API. A failed pipeline stage is
/// undone by truncating back to the size recorded before it ran, which is
/// only sound while nothing outside [`Template::transaction`] can shrink it.
#[derive(Debug, Clone, Default)]
pub struct Template {
    graph: DependencyGraph,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: ResourceNode) -> Result<(), GraphError> {
        tracing::debug!(id = %node.id, kind = %node.kind, "add node");
        self.graph.add_node(node)
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let (from, to) = (from.into(), to.into());
        tracing::debug!(%from, %to, "add edge");
        self.graph.add_edge(from, to);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.graph.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&ResourceNode> {
        self.graph.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.graph.nodes()
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn validate(&self) -> Result<Vec<String>, GraphError> {
        self.graph.validate()
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            nodes: self.graph.nodes.len(),
            edges: self.graph.edges.len(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.graph.nodes.truncate(checkpoint.nodes);
        self.graph.edges.truncate(checkpoint.edges);
    }

    /// Run `stage` against the template; if it fails, discard whatever it
    /// appended so the template is exactly as it was before the call.
    pub(crate) fn transaction<T, E>(
        &mut self,
        stage: impl FnOnce(&mut Template) -> Result<T, E>,
    ) -> Result<T, E> {
        let checkpoint = self.checkpoint();
        let result = stage(self);
        if result.is_err() {
            self.rollback(checkpoint);
        }
        result
    }
}
