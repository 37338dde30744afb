//! Grant selection with subtree cascade
//!
//! [`SelectionState::toggle`] is the only mutation: it applies the new status
//! of a node to its whole subtree. Ancestors are never touched, so after an
//! independent edit below it a granted ancestor can sit over a partly revoked
//! subtree. [`SelectionState::coverage`] derives the full/partial/none view
//! from the set on demand without feeding back into toggles.
//!
//! Persisted ids the loaded tree does not contain stay granted untouched and
//! are re-emitted on [`SelectionState::encode`], so a save never deletes
//! grants for nodes the Tree Source currently hides.

use crate::error::AuthzError;
use crate::index::DescendantIndex;
use crate::tree::TreeModel;
use crate::types::NodeId;
use indexmap::IndexSet;
use std::collections::HashSet;
use std::sync::Arc;

/// Result of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantChange {
    /// Node and subtree granted
    Granted {
        /// Ids in the subtree
        affected: usize,
    },
    /// Node and subtree revoked
    Revoked {
        /// Ids in the subtree
        affected: usize,
    },
}

impl GrantChange {
    /// Whether the toggled node ended up granted
    #[inline]
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Grant status of a whole subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Every id in the subtree granted
    Full,
    /// Some but not all granted
    Partial,
    /// Nothing granted
    None,
}

/// Mutable set of granted node ids over one loaded tree
#[derive(Debug, Clone)]
pub struct SelectionState {
    tree: Arc<TreeModel>,
    index: Arc<DescendantIndex>,
    granted: HashSet<NodeId>,
    /// Granted ids outside the tree, in seed order
    stale: Vec<NodeId>,
}

impl SelectionState {
    /// Seed a selection with exactly the given ids
    ///
    /// No cascade is applied to the seed. Ids absent from the tree are kept
    /// as granted and also returned as stale grants, in seed order.
    pub fn new(
        tree: Arc<TreeModel>,
        index: Arc<DescendantIndex>,
        seed: impl IntoIterator<Item = NodeId>,
    ) -> (Self, Vec<NodeId>) {
        let mut granted = HashSet::new();
        let mut stale = Vec::new();
        for id in seed {
            if !tree.contains(id.as_str()) && !stale.contains(&id) {
                stale.push(id.clone());
            }
            granted.insert(id);
        }

        if !stale.is_empty() {
            tracing::warn!(
                count = stale.len(),
                ids = ?stale,
                "Keeping granted ids absent from tree"
            );
        }

        let reported = stale.clone();
        (
            Self {
                tree,
                index,
                granted,
                stale,
            },
            reported,
        )
    }

    /// Empty selection
    #[must_use]
    pub fn empty(tree: Arc<TreeModel>, index: Arc<DescendantIndex>) -> Self {
        Self {
            tree,
            index,
            granted: HashSet::new(),
            stale: Vec::new(),
        }
    }

    /// Granted ids the tree does not contain, in seed order
    #[inline]
    #[must_use]
    pub fn stale(&self) -> &[NodeId] {
        &self.stale
    }

    /// Check if a node is granted, including stale seed ids
    #[inline]
    #[must_use]
    pub fn is_granted(&self, id: &str) -> bool {
        self.granted.contains(id)
    }

    /// Flip a node and cascade the new status to its subtree
    ///
    /// # Errors
    /// Returns [`AuthzError::UnknownNode`] if `id` is not in the tree.
    pub fn toggle(&mut self, id: &str) -> Result<GrantChange, AuthzError> {
        let index = Arc::clone(&self.index);
        let subtree = index
            .descendants(id)
            .ok_or_else(|| AuthzError::UnknownNode(NodeId::from(id)))?;
        let affected = subtree.len();

        let change = if self.granted.contains(id) {
            for member in subtree {
                self.granted.remove(member);
            }
            GrantChange::Revoked { affected }
        } else {
            self.granted.extend(subtree.iter().cloned());
            GrantChange::Granted { affected }
        };

        tracing::debug!(node = id, ?change, "Toggled grant");
        Ok(change)
    }

    /// Granted ids within the subtree of `id`
    ///
    /// # Errors
    /// Returns [`AuthzError::UnknownNode`] if `id` is not in the tree.
    pub fn granted_count(&self, id: &str) -> Result<usize, AuthzError> {
        Ok(self
            .subtree(id)?
            .iter()
            .filter(|member| self.granted.contains(*member))
            .count())
    }

    /// Size of the subtree of `id`
    ///
    /// # Errors
    /// Returns [`AuthzError::UnknownNode`] if `id` is not in the tree.
    pub fn total_count(&self, id: &str) -> Result<usize, AuthzError> {
        Ok(self.subtree(id)?.len())
    }

    /// Full/partial/none status of the subtree of `id`
    ///
    /// # Errors
    /// Returns [`AuthzError::UnknownNode`] if `id` is not in the tree.
    pub fn coverage(&self, id: &str) -> Result<Coverage, AuthzError> {
        let granted = self.granted_count(id)?;
        let total = self.total_count(id)?;
        Ok(match granted {
            0 => Coverage::None,
            n if n == total => Coverage::Full,
            _ => Coverage::Partial,
        })
    }

    /// Granted ids in tree pre-order, then stale ids in seed order
    ///
    /// The order depends only on the tree, the set and the seed, never on
    /// the order of the toggles that produced it.
    #[must_use]
    pub fn encode(&self) -> Vec<NodeId> {
        self.tree
            .ids()
            .filter(|id| self.granted.contains(*id))
            .chain(&self.stale)
            .cloned()
            .collect()
    }

    /// Check that every id is granted
    pub fn contains_all<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> bool {
        ids.into_iter().all(|id| self.granted.contains(id))
    }

    /// Granted ids, unordered
    pub fn iter(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.granted.iter()
    }

    /// Granted id set
    #[inline]
    #[must_use]
    pub fn granted(&self) -> &HashSet<NodeId> {
        &self.granted
    }

    /// Number of granted ids
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.granted.len()
    }

    /// Nothing granted
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.granted.is_empty()
    }

    /// Tree the selection ranges over
    #[inline]
    #[must_use]
    pub fn tree(&self) -> &TreeModel {
        &self.tree
    }

    fn subtree(&self, id: &str) -> Result<&IndexSet<NodeId>, AuthzError> {
        self.index
            .descendants(id)
            .ok_or_else(|| AuthzError::UnknownNode(NodeId::from(id)))
    }
}
