//! Descendant index
//!
//! Precomputed map from node id to the node itself plus every node below it,
//! so a cascade never walks the tree.

use crate::tree::TreeModel;
use crate::types::NodeId;
use indexmap::IndexSet;
use std::collections::HashMap;

/// Read-only `id -> subtree ids` mapping for one loaded tree
///
/// Each entry is ordered self-first, then the entries of the children in
/// child order, which is the pre-order listing of the subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescendantIndex {
    entries: HashMap<NodeId, IndexSet<NodeId>>,
}

impl DescendantIndex {
    /// Build from a tree in one children-before-parents pass
    #[must_use]
    pub fn build(tree: &TreeModel) -> Self {
        let mut entries: HashMap<NodeId, IndexSet<NodeId>> = HashMap::with_capacity(tree.len());

        // Reverse pre-order visits every child before its parent.
        for node in tree.iter().rev() {
            let mut entry = IndexSet::new();
            entry.insert(node.id().clone());
            for child in tree.children(node) {
                if let Some(sub) = entries.get(child.id()) {
                    entry.extend(sub.iter().cloned());
                }
            }
            entries.insert(node.id().clone(), entry);
        }

        Self { entries }
    }

    /// Node and all of its descendants
    #[must_use]
    pub fn descendants(&self, id: &str) -> Option<&IndexSet<NodeId>> {
        self.entries.get(id)
    }

    /// Size of the subtree rooted at `id`, including `id`
    #[must_use]
    pub fn subtree_size(&self, id: &str) -> Option<usize> {
        self.entries.get(id).map(IndexSet::len)
    }

    /// Check whether `id` lies in the subtree of `ancestor` (inclusive)
    #[must_use]
    pub fn is_descendant(&self, ancestor: &str, id: &str) -> bool {
        self.entries
            .get(ancestor)
            .is_some_and(|entry| entry.contains(id))
    }

    /// Number of indexed nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Index without entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
