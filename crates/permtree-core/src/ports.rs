//! Collaborator contracts
//!
//! The core never talks to a backend directly. A [`TreeSource`] supplies the
//! node hierarchy for a scope and a [`GrantStore`] reads and writes the
//! granted id list. Transport and storage format belong to the implementor.

use crate::error::PortError;
use crate::types::{NodeId, ScopeKey, TreeSpec};
use async_trait::async_trait;

/// Supplies the node hierarchy for a scope
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TreeSource: Send + Sync {
    /// Fetch the hierarchy description
    async fn fetch_tree(&self, scope: &ScopeKey) -> Result<TreeSpec, PortError>;
}

/// Persists the granted id list of a scope
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Fetch the currently granted ids
    async fn fetch_granted(&self, scope: &ScopeKey) -> Result<Vec<NodeId>, PortError>;

    /// Replace the granted ids with `granted`, in the given order
    async fn save_granted(&self, scope: &ScopeKey, granted: &[NodeId]) -> Result<(), PortError>;
}
