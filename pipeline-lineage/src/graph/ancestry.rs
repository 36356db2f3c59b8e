// Ancestry Tree
// Prefix tree over store keys: shared ancestry is one node, every path stays acyclic

use super::{escape, validate_key};
use crate::error::{LineageError, LineageResult};
use crate::key::{common_prefix_length, CompositeKey, Segment};
use crate::store::OutputStore;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;

/// One key prefix in the ancestry tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AncestryNode {
    /// Last segment of the prefix this node stands for
    pub segment: Segment,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub depth: usize,
    /// Set when the prefix is itself a key of the store
    pub key: Option<CompositeKey>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AncestryTree {
    nodes: Vec<AncestryNode>,
    roots: Vec<usize>,
    #[serde(skip)]
    prefixes: HashMap<CompositeKey, usize>,
}

/// Build the ancestry tree of a store; the sentinel is never part of it
pub fn build_ancestry_tree<V>(store: &OutputStore<V>) -> LineageResult<AncestryTree> {
    AncestryTree::from_keys(store.keys())
}

impl AncestryTree {
    pub fn from_keys<'a, I>(keys: I) -> LineageResult<Self>
    where
        I: IntoIterator<Item = &'a CompositeKey>,
    {
        let mut tree = Self::default();
        let mut inserted: Vec<&CompositeKey> = Vec::new();

        for key in keys {
            validate_key(key)?;

            // Attach below the deepest prefix shared with any earlier key
            let shared = inserted
                .iter()
                .map(|earlier| common_prefix_length(earlier, key))
                .max()
                .unwrap_or(0);
            let mut parent = match shared {
                0 => None,
                n => Some(tree.prefix_node(&key.prefix(n))?),
            };

            for depth in shared..key.len() {
                let idx = tree.nodes.len();
                tree.nodes.push(AncestryNode {
                    segment: key.segments()[depth].clone(),
                    parent,
                    children: Vec::new(),
                    depth,
                    key: None,
                });
                match parent {
                    Some(p) => tree.nodes[p].children.push(idx),
                    None => tree.roots.push(idx),
                }
                tree.prefixes.insert(key.prefix(depth + 1), idx);
                parent = Some(idx);
            }

            let leaf = tree.prefix_node(key)?;
            tree.nodes[leaf].key = Some(key.clone());
            inserted.push(key);
        }

        Ok(tree)
    }

    fn prefix_node(&self, prefix: &CompositeKey) -> LineageResult<usize> {
        self.prefixes
            .get(prefix)
            .copied()
            .ok_or_else(|| LineageError::malformed(prefix, "prefix missing from ancestry tree"))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[AncestryNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> Option<&AncestryNode> {
        self.nodes.get(idx)
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Node standing for `prefix`, if any key starts with it
    pub fn find(&self, prefix: &CompositeKey) -> Option<usize> {
        self.prefixes.get(prefix).copied()
    }

    /// Full prefix a node stands for
    pub fn path(&self, idx: usize) -> CompositeKey {
        let mut segments = Vec::new();
        let mut current = self.nodes.get(idx);
        while let Some(node) = current {
            segments.push(node.segment.clone());
            current = node.parent.and_then(|p| self.nodes.get(p));
        }
        segments.reverse();
        CompositeKey::from_segments(segments)
    }

    /// Store keys at or below a node
    pub fn descendant_keys(&self, idx: usize) -> Vec<&CompositeKey> {
        let mut keys = Vec::new();
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if let Some(key) = &node.key {
                keys.push(key);
            }
            stack.extend(node.children.iter().rev());
        }
        keys
    }

    /// Deepest prefix two keys have in common, as a node
    pub fn common_ancestor(&self, a: &CompositeKey, b: &CompositeKey) -> Option<usize> {
        match common_prefix_length(a, b) {
            0 => None,
            n => self.find(&a.prefix(n)),
        }
    }

    /// Graphviz rendering input
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph ancestry {\n");
        for (i, node) in self.nodes.iter().enumerate() {
            let shape = if node.key.is_some() {
                "doublecircle"
            } else if node.segment.is_smart() {
                "box"
            } else {
                "ellipse"
            };
            let _ = writeln!(
                dot,
                "    n{} [label=\"{}\", shape={}];",
                i,
                escape(node.segment.identifier()),
                shape
            );
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                let _ = writeln!(dot, "    n{} -> n{};", parent, i);
            }
        }
        dot.push_str("}\n");
        dot
    }
}
