//! Testing utilities for permtree workspace
//!
//! Shared tree fixtures and in-memory collaborators with latency and failure
//! injection.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use permtree_core::{
    GrantStore, NodeId, NodeSpec, PortError, ScopeKey, SessionConfig, SyncCoordinator, TreeSource,
    TreeSpec,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// `A{B, C{D}}`
pub fn abcd_tree() -> TreeSpec {
    TreeSpec::Nested(vec![NodeSpec::branch(
        "A",
        vec![
            NodeSpec::leaf("B"),
            NodeSpec::branch("C", vec![NodeSpec::leaf("D")]),
        ],
    )])
}

/// `A{B{E}, C{D}}`
pub fn five_node_tree() -> TreeSpec {
    TreeSpec::Nested(vec![NodeSpec::branch(
        "A",
        vec![
            NodeSpec::branch("B", vec![NodeSpec::leaf("E")]),
            NodeSpec::branch("C", vec![NodeSpec::leaf("D")]),
        ],
    )])
}

/// Storefront admin menu with pages and actions, two roots
pub fn storefront_tree() -> TreeSpec {
    TreeSpec::Nested(vec![
        NodeSpec::branch(
            "orders",
            vec![
                NodeSpec::branch(
                    "orders.list",
                    vec![
                        NodeSpec::leaf("orders.list.export").with_label("Export"),
                        NodeSpec::leaf("orders.list.cancel").with_label("Cancel order"),
                    ],
                )
                .with_label("Order list"),
                NodeSpec::branch(
                    "orders.refunds",
                    vec![
                        NodeSpec::leaf("orders.refunds.approve").with_label("Approve"),
                        NodeSpec::leaf("orders.refunds.reject").with_label("Reject"),
                    ],
                )
                .with_label("Refunds"),
            ],
        )
        .with_label("Orders"),
        NodeSpec::branch(
            "catalog",
            vec![
                NodeSpec::leaf("catalog.products").with_label("Products"),
                NodeSpec::leaf("catalog.categories").with_label("Categories"),
            ],
        )
        .with_label("Catalog"),
    ])
}

/// Owned ids from string slices
pub fn ids(raw: &[&str]) -> Vec<NodeId> {
    raw.iter().map(|s| NodeId::from(*s)).collect()
}

/// Coordinator over the given fakes with default config
pub fn coordinator(
    scope: &str,
    source: &Arc<FakeTreeSource>,
    store: &Arc<MemoryGrantStore>,
) -> SyncCoordinator {
    coordinator_with(scope, source, store, SessionConfig::new())
}

/// Coordinator over the given fakes
pub fn coordinator_with(
    scope: &str,
    source: &Arc<FakeTreeSource>,
    store: &Arc<MemoryGrantStore>,
    config: SessionConfig,
) -> SyncCoordinator {
    let source: Arc<dyn TreeSource> = Arc::clone(source) as Arc<dyn TreeSource>;
    let store: Arc<dyn GrantStore> = Arc::clone(store) as Arc<dyn GrantStore>;
    SyncCoordinator::new(scope, source, store, config)
}

/// Tree Source serving one description for every scope
#[derive(Debug)]
pub struct FakeTreeSource {
    spec: TreeSpec,
    latency: Mutex<Duration>,
    failure: Mutex<Option<PortError>>,
    fetches: AtomicUsize,
}

impl FakeTreeSource {
    pub fn new(spec: TreeSpec) -> Self {
        Self {
            spec,
            latency: Mutex::new(Duration::ZERO),
            failure: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn shared(spec: TreeSpec) -> Arc<Self> {
        Arc::new(Self::new(spec))
    }

    /// Delay every fetch by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Fail every fetch until [`recover`](Self::recover)
    pub fn fail_with(&self, error: PortError) {
        *self.failure.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    /// Fetches started so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TreeSource for FakeTreeSource {
    async fn fetch_tree(&self, _scope: &ScopeKey) -> Result<TreeSpec, PortError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        Ok(self.spec.clone())
    }
}

/// Grant Store keeping lists per scope in memory
#[derive(Debug, Default)]
pub struct MemoryGrantStore {
    grants: Mutex<HashMap<ScopeKey, Vec<NodeId>>>,
    history: Mutex<Vec<(ScopeKey, Vec<NodeId>)>>,
    latency: Mutex<Duration>,
    fetch_failure: Mutex<Option<PortError>>,
    save_failure: Mutex<Option<PortError>>,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed stored grants for a scope
    pub fn with_grants(self, scope: &str, granted: &[&str]) -> Self {
        self.grants.lock().insert(ScopeKey::from(scope), ids(granted));
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn fail_fetch_with(&self, error: PortError) {
        *self.fetch_failure.lock() = Some(error);
    }

    pub fn fail_save_with(&self, error: PortError) {
        *self.save_failure.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.fetch_failure.lock() = None;
        *self.save_failure.lock() = None;
    }

    /// Currently stored grants for a scope
    pub fn stored(&self, scope: &str) -> Option<Vec<NodeId>> {
        self.grants.lock().get(scope).cloned()
    }

    /// Every successful save in order
    pub fn save_history(&self) -> Vec<(ScopeKey, Vec<NodeId>)> {
        self.history.lock().clone()
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn fetch_granted(&self, scope: &ScopeKey) -> Result<Vec<NodeId>, PortError> {
        self.delay().await;
        if let Some(err) = self.fetch_failure.lock().clone() {
            return Err(err);
        }
        Ok(self.grants.lock().get(scope).cloned().unwrap_or_default())
    }

    async fn save_granted(&self, scope: &ScopeKey, granted: &[NodeId]) -> Result<(), PortError> {
        self.delay().await;
        if let Some(err) = self.save_failure.lock().clone() {
            return Err(err);
        }
        self.grants.lock().insert(scope.clone(), granted.to_vec());
        self.history.lock().push((scope.clone(), granted.to_vec()));
        Ok(())
    }
}
