//! Tree model built from a Tree Source description
//!
//! Provides [`TreeModel`], an immutable arena of [`Node`]s laid out in
//! pre-order. Parent and child links are arena indices, so ownership of a
//! subtree is exclusive by construction and no cycle can be represented.

use crate::error::MalformedTreeError;
use crate::types::{FlatNodeSpec, NodeId, NodeSpec, TreeLimits, TreeSpec};
use std::collections::HashMap;

/// One grantable unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    label: String,
    parent: Option<usize>,
    children: Vec<usize>,
    depth: usize,
}

impl Node {
    /// Node id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Display name
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Distance from the root, roots are 0
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Node without children
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Top-level node
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of direct children
    #[inline]
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Immutable-after-load node hierarchy with id lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeModel {
    /// Arena in pre-order
    nodes: Vec<Node>,
    roots: Vec<usize>,
    by_id: HashMap<NodeId, usize>,
}

impl TreeModel {
    /// Build a tree from either description shape
    ///
    /// # Errors
    /// Returns [`MalformedTreeError`] on empty or duplicate ids, missing
    /// parents, unreachable flat records, or a violated limit. No partial
    /// tree is returned.
    pub fn build(spec: &TreeSpec, limits: TreeLimits) -> Result<Self, MalformedTreeError> {
        let count = spec.record_count();
        if let Some(limit) = limits.max_nodes {
            if count > limit {
                return Err(MalformedTreeError::TooManyNodes { count, limit });
            }
        }

        let tree = match spec {
            TreeSpec::Nested(roots) => Self::from_nested(roots, limits)?,
            TreeSpec::Flat(records) => Self::from_flat(records, limits)?,
        };

        tracing::debug!(
            nodes = tree.len(),
            roots = tree.roots.len(),
            depth = tree.max_depth(),
            "Built tree model"
        );
        Ok(tree)
    }

    fn from_nested(roots: &[NodeSpec], limits: TreeLimits) -> Result<Self, MalformedTreeError> {
        let mut arena = Arena::new(limits);
        let mut stack: Vec<(&NodeSpec, Option<usize>, usize)> =
            roots.iter().rev().map(|n| (n, None, 0)).collect();

        while let Some((spec, parent, depth)) = stack.pop() {
            let idx = arena.push(&spec.id, &spec.label, parent, depth)?;
            stack.extend(spec.children.iter().rev().map(|c| (c, Some(idx), depth + 1)));
        }

        Ok(arena.finish())
    }

    fn from_flat(records: &[FlatNodeSpec], limits: TreeLimits) -> Result<Self, MalformedTreeError> {
        let mut seen: HashMap<&str, &FlatNodeSpec> = HashMap::with_capacity(records.len());
        for record in records {
            if record.id.as_str().is_empty() {
                return Err(MalformedTreeError::EmptyId {
                    label: record.label.clone(),
                });
            }
            if seen.insert(record.id.as_str(), record).is_some() {
                return Err(MalformedTreeError::DuplicateId(record.id.clone()));
            }
        }

        let mut roots = Vec::new();
        let mut children_of: HashMap<&str, Vec<&FlatNodeSpec>> = HashMap::new();
        for record in records {
            match &record.parent {
                None => roots.push(record),
                Some(parent) if seen.contains_key(parent.as_str()) => {
                    children_of.entry(parent.as_str()).or_default().push(record);
                }
                Some(parent) => {
                    return Err(MalformedTreeError::MissingParent {
                        node: record.id.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        let mut arena = Arena::new(limits);
        let mut stack: Vec<(&FlatNodeSpec, Option<usize>, usize)> =
            roots.into_iter().rev().map(|r| (r, None, 0)).collect();

        while let Some((record, parent, depth)) = stack.pop() {
            let idx = arena.push(&record.id, &record.label, parent, depth)?;
            if let Some(children) = children_of.get(record.id.as_str()) {
                stack.extend(children.iter().rev().map(|c| (*c, Some(idx), depth + 1)));
            }
        }

        if arena.nodes.len() < records.len() {
            let nodes = records
                .iter()
                .filter(|r| !arena.by_id.contains_key(&r.id))
                .map(|r| r.id.clone())
                .collect();
            return Err(MalformedTreeError::Unreachable { nodes });
        }

        Ok(arena.finish())
    }

    /// Ordered top-level nodes
    pub fn roots(&self) -> impl Iterator<Item = &Node> + '_ {
        self.roots.iter().map(|&i| &self.nodes[i])
    }

    /// Look up node by id
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&Node> {
        self.by_id.get(id).map(|&i| &self.nodes[i])
    }

    /// Check id membership
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Ordered children of a node
    pub fn children<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Node> + 'a {
        node.children.iter().map(|&i| &self.nodes[i])
    }

    /// Parent of a node
    #[must_use]
    pub fn parent(&self, node: &Node) -> Option<&Node> {
        node.parent.map(|i| &self.nodes[i])
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Node> + 'a {
        std::iter::successors(self.parent(node), |n| self.parent(n))
    }

    /// All nodes in pre-order
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    /// All ids in pre-order
    pub fn ids(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.nodes.iter().map(Node::id)
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Tree without nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deepest node depth, 0 for an empty tree
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(Node::depth).max().unwrap_or(0)
    }
}

/// Pre-order arena under construction
struct Arena {
    limits: TreeLimits,
    nodes: Vec<Node>,
    roots: Vec<usize>,
    by_id: HashMap<NodeId, usize>,
}

impl Arena {
    fn new(limits: TreeLimits) -> Self {
        Self {
            limits,
            nodes: Vec::new(),
            roots: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    fn push(
        &mut self,
        id: &NodeId,
        label: &str,
        parent: Option<usize>,
        depth: usize,
    ) -> Result<usize, MalformedTreeError> {
        if id.as_str().is_empty() {
            return Err(MalformedTreeError::EmptyId {
                label: label.to_string(),
            });
        }
        if let Some(limit) = self.limits.max_depth {
            if depth > limit {
                return Err(MalformedTreeError::TooDeep {
                    node: id.clone(),
                    depth,
                    limit,
                });
            }
        }

        let idx = self.nodes.len();
        if self.by_id.insert(id.clone(), idx).is_some() {
            return Err(MalformedTreeError::DuplicateId(id.clone()));
        }

        self.nodes.push(Node {
            id: id.clone(),
            label: label.to_string(),
            parent,
            children: Vec::new(),
            depth,
        });
        match parent {
            Some(p) => self.nodes[p].children.push(idx),
            None => self.roots.push(idx),
        }
        Ok(idx)
    }

    fn finish(self) -> TreeModel {
        TreeModel {
            nodes: self.nodes,
            roots: self.roots,
            by_id: self.by_id,
        }
    }
}
