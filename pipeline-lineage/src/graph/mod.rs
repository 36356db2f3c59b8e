// Lineage Graph Builder
// Reconstructs the branching structure of a pipeline from the keys of a store

pub mod ancestry;

pub use ancestry::{build_ancestry_tree, AncestryNode, AncestryTree};

use crate::error::{LineageError, LineageResult};
use crate::key::{CompositeKey, Segment};
use crate::store::OutputStore;

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write;

/// Directed graph of pipeline choices.
///
/// Nodes are the distinct segments found across all keys; an edge `a -> b`
/// exists whenever `b` directly follows `a` in some key. Identical segments are
/// one node, so a subsampling draw feeding several models appears once.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LineageGraph {
    nodes: Vec<Segment>,
    edges: Vec<(usize, usize)>,
    #[serde(skip)]
    node_indices: HashMap<Segment, usize>,
    #[serde(skip)]
    edge_set: HashSet<(usize, usize)>,
}

/// Build the lineage graph of a store; the sentinel is never part of it
pub fn build_graph<V>(store: &OutputStore<V>) -> LineageResult<LineageGraph> {
    LineageGraph::from_keys(store.keys())
}

/// Reject empty keys and keys holding blank segments
pub(crate) fn validate_key(key: &CompositeKey) -> LineageResult<()> {
    if key.is_empty() {
        return Err(LineageError::malformed(key, "key has no segments"));
    }
    if let Some(position) = key.iter().position(|s| !s.is_valid()) {
        return Err(LineageError::malformed(
            key,
            format!("segment {} is blank", position),
        ));
    }
    Ok(())
}

impl LineageGraph {
    pub fn from_keys<'a, I>(keys: I) -> LineageResult<Self>
    where
        I: IntoIterator<Item = &'a CompositeKey>,
    {
        let keys: Vec<&CompositeKey> = keys.into_iter().collect();
        for key in &keys {
            validate_key(key)?;
        }

        let mut graph = Self::default();

        // First pass: one node per distinct segment
        for key in &keys {
            for segment in key.iter() {
                if !graph.node_indices.contains_key(segment) {
                    graph.node_indices.insert(segment.clone(), graph.nodes.len());
                    graph.nodes.push(segment.clone());
                }
            }
        }

        // Second pass: link consecutive segments
        for key in &keys {
            for pair in key.segments().windows(2) {
                let from = graph.node_indices[&pair[0]];
                let to = graph.node_indices[&pair[1]];
                if graph.edge_set.insert((from, to)) {
                    graph.edges.push((from, to));
                }
            }
        }

        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &[Segment] {
        &self.nodes
    }

    pub fn edges(&self) -> impl Iterator<Item = (&Segment, &Segment)> {
        self.edges
            .iter()
            .map(|&(from, to)| (&self.nodes[from], &self.nodes[to]))
    }

    pub fn contains_node(&self, segment: &Segment) -> bool {
        self.node_indices.contains_key(segment)
    }

    pub fn has_edge(&self, from: &Segment, to: &Segment) -> bool {
        match (self.node_indices.get(from), self.node_indices.get(to)) {
            (Some(&a), Some(&b)) => self.edge_set.contains(&(a, b)),
            _ => false,
        }
    }

    /// Segments that directly follow `segment` in some key
    pub fn successors(&self, segment: &Segment) -> Vec<&Segment> {
        let Some(&idx) = self.node_indices.get(segment) else {
            return Vec::new();
        };
        self.edges
            .iter()
            .filter(|(from, _)| *from == idx)
            .map(|&(_, to)| &self.nodes[to])
            .collect()
    }

    /// Segments that directly precede `segment` in some key
    pub fn predecessors(&self, segment: &Segment) -> Vec<&Segment> {
        let Some(&idx) = self.node_indices.get(segment) else {
            return Vec::new();
        };
        self.edges
            .iter()
            .filter(|(_, to)| *to == idx)
            .map(|&(from, _)| &self.nodes[from])
            .collect()
    }

    /// Nodes nothing points to
    pub fn roots(&self) -> Vec<&Segment> {
        let targets: HashSet<usize> = self.edges.iter().map(|&(_, to)| to).collect();
        (0..self.nodes.len())
            .filter(|i| !targets.contains(i))
            .map(|i| &self.nodes[i])
            .collect()
    }

    /// Nodes pointing nowhere
    pub fn leaves(&self) -> Vec<&Segment> {
        let sources: HashSet<usize> = self.edges.iter().map(|&(from, _)| from).collect();
        (0..self.nodes.len())
            .filter(|i| !sources.contains(i))
            .map(|i| &self.nodes[i])
            .collect()
    }

    /// Nodes in dependency order, or `None` when the graph has a cycle.
    ///
    /// Cycles appear when one plain identifier recurs along a path, e.g.
    /// `X_train -> feat_extraction_0 -> X_train`.
    pub fn topological_order(&self) -> Option<Vec<&Segment>> {
        // Kahn's algorithm, seeded in node order for a stable result
        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut adj_list: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for &(from, to) in &self.edges {
            adj_list[from].push(to);
            in_degree[to] += 1;
        }

        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            result.push(&self.nodes[node]);
            for &neighbor in &adj_list[node] {
                in_degree[neighbor] -= 1;
                if in_degree[neighbor] == 0 {
                    queue.push_back(neighbor);
                }
            }
        }

        if result.len() == self.nodes.len() {
            Some(result)
        } else {
            None
        }
    }

    pub fn is_acyclic(&self) -> bool {
        self.topological_order().is_some()
    }

    /// Graphviz rendering input; smart subkeys are drawn as boxes
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph lineage {\n");
        for (i, segment) in self.nodes.iter().enumerate() {
            match segment {
                Segment::Plain(identifier) => {
                    let _ = writeln!(dot, "    n{} [label=\"{}\"];", i, escape(identifier));
                }
                Segment::Smart { instance, set_name } => {
                    let _ = writeln!(
                        dot,
                        "    n{} [label=\"{}\", tooltip=\"{}\", shape=box];",
                        i,
                        escape(instance),
                        escape(set_name)
                    );
                }
            }
        }
        for &(from, to) in &self.edges {
            let _ = writeln!(dot, "    n{} -> n{};", from, to);
        }
        dot.push_str("}\n");
        dot
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn escape(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
