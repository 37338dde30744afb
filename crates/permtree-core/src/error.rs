//! Error types for permtree
//!
//! Provides error handling for:
//! - Tree construction from a Tree Source description
//! - Collaborator (Tree Source / Grant Store) failures
//! - Session phase violations
//! - Operations on ids outside the loaded tree

use crate::state_machine::SessionPhase;
use crate::types::{NodeId, ScopeKey};

/// Main permtree error type
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Tree description could not be built
    #[error("malformed tree: {0}")]
    MalformedTree(#[from] MalformedTreeError),

    /// Tree Source fetch failed
    #[error("tree load failed for scope {scope}: {source}")]
    TreeLoad {
        /// Session scope
        scope: ScopeKey,
        /// Collaborator error
        #[source]
        source: PortError,
    },

    /// Grant Store fetch failed
    #[error("grant load failed for scope {scope}: {source}")]
    GrantLoad {
        /// Session scope
        scope: ScopeKey,
        /// Collaborator error
        #[source]
        source: PortError,
    },

    /// Grant Store save failed
    #[error("grant submit failed for scope {scope}: {source}")]
    GrantSubmit {
        /// Session scope
        scope: ScopeKey,
        /// Collaborator error
        #[source]
        source: PortError,
    },

    /// Id outside the loaded tree
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// Phase transition not permitted
    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),

    /// No editable session in the current phase
    #[error("session not editable in phase {phase:?}")]
    SessionNotEditable {
        /// Phase at the time of the call
        phase: SessionPhase,
    },

    /// Load cancelled by the hosting session
    #[error("load cancelled")]
    Cancelled,
}

impl AuthzError {
    /// Check if the caller may retry the failed operation
    ///
    /// Load errors are retried with `load()`, submit errors with `submit()`.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TreeLoad { .. } | Self::GrantLoad { .. } | Self::GrantSubmit { .. }
        )
    }

    /// Check if the session cannot show a tree at all
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MalformedTree(_))
    }

    /// Collaborator error behind a load or submit failure
    #[must_use]
    pub fn port_error(&self) -> Option<&PortError> {
        match self {
            Self::TreeLoad { source, .. }
            | Self::GrantLoad { source, .. }
            | Self::GrantSubmit { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Tree construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedTreeError {
    /// Node with an empty id
    #[error("empty node id (label: {label:?})")]
    EmptyId {
        /// Label of the offending node
        label: String,
    },

    /// Id appears more than once
    #[error("duplicate node id: {0}")]
    DuplicateId(NodeId),

    /// Flat record points at a parent that does not exist
    #[error("node {node} references missing parent {parent}")]
    MissingParent {
        /// Offending node
        node: NodeId,
        /// Referenced parent
        parent: NodeId,
    },

    /// Flat records not reachable from any root
    #[error("nodes unreachable from any root: {nodes:?}")]
    Unreachable {
        /// Ids that form a parent cycle
        nodes: Vec<NodeId>,
    },

    /// Node count exceeds configured limit
    #[error("tree has {count} nodes, limit {limit}")]
    TooManyNodes {
        /// Nodes in the description
        count: usize,
        /// Configured bound
        limit: usize,
    },

    /// Node depth exceeds configured limit
    #[error("node {node} at depth {depth} exceeds limit {limit}")]
    TooDeep {
        /// First node past the bound
        node: NodeId,
        /// Its depth
        depth: usize,
        /// Configured bound
        limit: usize,
    },
}

/// Errors reported by Tree Source and Grant Store implementations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// Backend unreachable or failed
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Nothing stored for the scope
    #[error("scope not found: {0}")]
    NotFound(ScopeKey),

    /// Backend refused the request or returned unusable data
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Caller-supplied timeout expired
    #[error("timed out after {after_ms}ms")]
    Timeout {
        /// Configured timeout
        after_ms: u64,
    },
}

impl PortError {
    /// Create unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create rejected error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// Illegal session phase transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal phase transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    /// Current phase
    pub from: SessionPhase,
    /// Requested phase
    pub to: SessionPhase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authz_error_display() {
        let err = AuthzError::GrantLoad {
            scope: ScopeKey::from("pkg-7"),
            source: PortError::unavailable("connection refused"),
        };
        let msg = err.to_string();
        assert!(msg.contains("grant load failed"));
        assert!(msg.contains("pkg-7"));
    }

    #[test]
    fn authz_error_is_retryable() {
        let scope = ScopeKey::from("pkg");
        assert!(AuthzError::TreeLoad {
            scope: scope.clone(),
            source: PortError::Timeout { after_ms: 10 },
        }
        .is_retryable());
        assert!(AuthzError::GrantSubmit {
            scope,
            source: PortError::rejected("stale"),
        }
        .is_retryable());
        assert!(!AuthzError::UnknownNode("x".into()).is_retryable());
        assert!(!AuthzError::Cancelled.is_retryable());
    }

    #[test]
    fn malformed_tree_is_fatal() {
        let err = AuthzError::from(MalformedTreeError::DuplicateId("A".into()));
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
        assert!(err.port_error().is_none());
    }

    #[test]
    fn transition_error_converts() {
        let err: AuthzError = TransitionError {
            from: SessionPhase::Idle,
            to: SessionPhase::Done,
        }
        .into();
        assert!(err.to_string().contains("Idle -> Done"));
    }
}
