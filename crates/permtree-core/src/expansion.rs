//! Expansion tracking, independent of grants

use crate::error::AuthzError;
use crate::tree::{Node, TreeModel};
use crate::types::NodeId;
use std::collections::HashSet;
use std::sync::Arc;

/// Set of node ids currently rendered expanded
///
/// Expansion is per node: collapsing a parent hides its subtree from
/// [`visible`](Self::visible) but keeps the children's own flags.
#[derive(Debug, Clone)]
pub struct ExpansionState {
    tree: Arc<TreeModel>,
    expanded: HashSet<NodeId>,
}

impl ExpansionState {
    /// Every node expanded
    #[must_use]
    pub fn fully_expanded(tree: Arc<TreeModel>) -> Self {
        let expanded = tree.ids().cloned().collect();
        Self { tree, expanded }
    }

    /// Every node collapsed
    #[must_use]
    pub fn collapsed(tree: Arc<TreeModel>) -> Self {
        Self {
            tree,
            expanded: HashSet::new(),
        }
    }

    /// Check if a node is expanded
    #[inline]
    #[must_use]
    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Flip one node, returning whether it is now expanded
    ///
    /// # Errors
    /// Returns [`AuthzError::UnknownNode`] if `id` is not in the tree.
    pub fn toggle_expand(&mut self, id: &str) -> Result<bool, AuthzError> {
        let Some(node) = self.tree.by_id(id) else {
            return Err(AuthzError::UnknownNode(NodeId::from(id)));
        };

        if self.expanded.remove(id) {
            Ok(false)
        } else {
            self.expanded.insert(node.id().clone());
            Ok(true)
        }
    }

    /// Expand every node
    pub fn expand_all(&mut self) {
        self.expanded = self.tree.ids().cloned().collect();
    }

    /// Collapse every node
    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Nodes in pre-order whose ancestors are all expanded
    pub fn visible(&self) -> impl Iterator<Item = &Node> + '_ {
        self.tree.iter().filter(|node| {
            self.tree
                .ancestors(node)
                .all(|a| self.expanded.contains(a.id()))
        })
    }

    /// Number of expanded nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    /// Nothing expanded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}
