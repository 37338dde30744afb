//! Core types for permtree
//!
//! Defines the vocabulary shared by every component:
//! - Node and scope identifiers
//! - Tree descriptions handed over by a Tree Source
//! - Session configuration and tree limits

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::time::Duration;

/// Identifier of one grantable node (menu, page or action)
///
/// Opaque to the core; unique across a loaded tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create node id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier of the authorization subject a session edits
///
/// A package, an application or a tenant. Both collaborators are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    /// Create scope key
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ScopeKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ScopeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Nested node description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Node id
    pub id: NodeId,
    /// Display name
    #[serde(default)]
    pub label: String,
    /// Ordered children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    /// Leaf node whose label is its id
    #[must_use]
    pub fn leaf(id: impl Into<NodeId>) -> Self {
        let id = id.into();
        Self {
            label: id.to_string(),
            id,
            children: Vec::new(),
        }
    }

    /// Node with children whose label is its id
    #[must_use]
    pub fn branch(id: impl Into<NodeId>, children: Vec<NodeSpec>) -> Self {
        Self {
            children,
            ..Self::leaf(id)
        }
    }

    /// With display label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Flat node description with a parent pointer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatNodeSpec {
    /// Node id
    pub id: NodeId,
    /// Display name
    #[serde(default)]
    pub label: String,
    /// Parent id, `None` for roots
    #[serde(default)]
    pub parent: Option<NodeId>,
}

impl FlatNodeSpec {
    /// Create flat record whose label is its id
    #[must_use]
    pub fn new(id: impl Into<NodeId>, parent: Option<&str>) -> Self {
        let id = id.into();
        Self {
            label: id.to_string(),
            id,
            parent: parent.map(NodeId::from),
        }
    }
}

/// Node hierarchy as delivered by a Tree Source
///
/// Sibling order is significant in both shapes. For the flat shape it is the
/// record order among nodes sharing a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "nodes", rename_all = "snake_case")]
pub enum TreeSpec {
    /// Ordered roots with owned children
    Nested(Vec<NodeSpec>),
    /// Records with parent pointers
    Flat(Vec<FlatNodeSpec>),
}

impl TreeSpec {
    /// Number of node records in the description
    #[must_use]
    pub fn record_count(&self) -> usize {
        fn count(nodes: &[NodeSpec]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        match self {
            Self::Nested(roots) => count(roots),
            Self::Flat(records) => records.len(),
        }
    }
}

/// Caller-configurable bounds on a loaded tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeLimits {
    /// Maximum number of nodes
    pub max_nodes: Option<usize>,
    /// Maximum depth, roots are depth 0
    pub max_depth: Option<usize>,
}

impl TreeLimits {
    /// No bounds
    #[inline]
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// With node count bound
    #[inline]
    #[must_use]
    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = Some(max);
        self
    }

    /// With depth bound
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = Some(max);
        self
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Per-fetch timeout for the tree and grant loads
    pub fetch_timeout_ms: Option<u64>,
    /// Timeout for saving the grant list
    pub submit_timeout_ms: Option<u64>,
    /// Seed expansion with every node expanded
    pub expand_on_load: bool,
    /// Bounds applied when building the tree
    pub limits: TreeLimits,
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With fetch timeout
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// With submit timeout
    #[must_use]
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// With initial expansion
    #[inline]
    #[must_use]
    pub fn with_expand_on_load(mut self, expand: bool) -> Self {
        self.expand_on_load = expand;
        self
    }

    /// With tree limits
    #[inline]
    #[must_use]
    pub fn with_limits(mut self, limits: TreeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Fetch timeout as duration
    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    /// Submit timeout as duration
    #[must_use]
    pub fn submit_timeout(&self) -> Option<Duration> {
        self.submit_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: None,
            submit_timeout_ms: None,
            expand_on_load: true,
            limits: TreeLimits::unlimited(),
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
