//! Sync coordinator
//!
//! Drives one authorization editing session:
//! - Loads the tree and the persisted grants concurrently, all-or-nothing
//! - Holds the selection and expansion while the operator edits
//! - Submits the encoded selection back to the Grant Store
//!
//! The coordinator never retries. Every recoverable failure is returned to
//! the caller, who owns retry and backoff.

use crate::error::{AuthzError, MalformedTreeError, PortError};
use crate::expansion::ExpansionState;
use crate::index::DescendantIndex;
use crate::ports::{GrantStore, TreeSource};
use crate::selection::{GrantChange, SelectionState};
use crate::state_machine::{validate_transition, SessionPhase};
use crate::tree::TreeModel;
use crate::types::{NodeId, ScopeKey, SessionConfig, TreeSpec};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Loaded state of one editing session
#[derive(Debug, Clone)]
pub struct Session {
    tree: Arc<TreeModel>,
    index: Arc<DescendantIndex>,
    selection: SelectionState,
    expansion: ExpansionState,
    stale_grants: Vec<NodeId>,
}

impl Session {
    /// Build tree, index, selection and expansion from fetched data
    ///
    /// # Errors
    /// Returns [`MalformedTreeError`] if the tree description is invalid.
    pub fn build(
        spec: &TreeSpec,
        granted: Vec<NodeId>,
        config: &SessionConfig,
    ) -> Result<Self, MalformedTreeError> {
        let tree = Arc::new(TreeModel::build(spec, config.limits)?);
        let index = Arc::new(DescendantIndex::build(&tree));
        let (selection, stale_grants) =
            SelectionState::new(Arc::clone(&tree), Arc::clone(&index), granted);
        let expansion = if config.expand_on_load {
            ExpansionState::fully_expanded(Arc::clone(&tree))
        } else {
            ExpansionState::collapsed(Arc::clone(&tree))
        };

        Ok(Self {
            tree,
            index,
            selection,
            expansion,
            stale_grants,
        })
    }

    /// Loaded tree
    #[inline]
    #[must_use]
    pub fn tree(&self) -> &TreeModel {
        &self.tree
    }

    /// Descendant index of the loaded tree
    #[inline]
    #[must_use]
    pub fn index(&self) -> &DescendantIndex {
        &self.index
    }

    /// Current grants
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Current expansion
    #[inline]
    #[must_use]
    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    /// Persisted grants that were not in the tree
    #[inline]
    #[must_use]
    pub fn stale_grants(&self) -> &[NodeId] {
        &self.stale_grants
    }
}

/// Outcome of a successful submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Scope the grants were saved under
    pub scope: ScopeKey,
    /// Exact list handed to the Grant Store
    pub granted: Vec<NodeId>,
}

/// Cancels an in-flight [`SyncCoordinator::load`]
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Signal cancellation; a no-op when no load is running
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Orchestrates load, edit and submit for one scope
pub struct SyncCoordinator {
    scope: ScopeKey,
    tree_source: Arc<dyn TreeSource>,
    grant_store: Arc<dyn GrantStore>,
    config: SessionConfig,
    phase: SessionPhase,
    session: Option<Session>,
    cancel: Arc<watch::Sender<bool>>,
}

impl fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("scope", &self.scope)
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    /// Create an idle coordinator
    #[must_use]
    pub fn new(
        scope: impl Into<ScopeKey>,
        tree_source: Arc<dyn TreeSource>,
        grant_store: Arc<dyn GrantStore>,
        config: SessionConfig,
    ) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            scope: scope.into(),
            tree_source,
            grant_store,
            config,
            phase: SessionPhase::Idle,
            session: None,
            cancel: Arc::new(tx),
        }
    }

    /// Scope this coordinator edits
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Session configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Loaded session, if any
    #[inline]
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Handle for cancelling a load from elsewhere
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel),
        }
    }

    /// Fetch tree and grants concurrently and seed a new session
    ///
    /// Any previous session is discarded first. Both fetches must succeed;
    /// the first failure wins and the other fetch is dropped. The seed is
    /// taken exactly as stored, without cascade correction.
    ///
    /// # Errors
    /// - [`AuthzError::TreeLoad`] / [`AuthzError::GrantLoad`] when a fetch
    ///   fails or times out
    /// - [`AuthzError::MalformedTree`] when the tree cannot be built
    /// - [`AuthzError::Cancelled`] when cancelled through a [`CancelHandle`]
    /// - [`AuthzError::IllegalTransition`] after a completed submit
    pub async fn load(&mut self) -> Result<&Session, AuthzError> {
        if self.phase == SessionPhase::Loading {
            tracing::warn!(scope = %self.scope, "Restarting abandoned load");
        }
        self.transition(SessionPhase::Loading)?;
        self.session = None;
        self.cancel.send_replace(false);
        let mut cancelled = self.cancel.subscribe();

        tracing::info!(scope = %self.scope, "Loading tree and grants");

        let timeout = self.config.fetch_timeout();
        let fetches = futures::future::try_join(
            fetch_tree(Arc::clone(&self.tree_source), self.scope.clone(), timeout),
            fetch_granted(Arc::clone(&self.grant_store), self.scope.clone(), timeout),
        );

        let outcome = tokio::select! {
            biased;
            _ = cancelled.wait_for(|c| *c) => None,
            res = fetches => Some(res),
        };

        let Some(result) = outcome else {
            tracing::warn!(scope = %self.scope, "Load cancelled, discarding fetches");
            self.transition(SessionPhase::Idle)?;
            return Err(AuthzError::Cancelled);
        };

        let (spec, granted) = match result {
            Ok(fetched) => fetched,
            Err(e) => return Err(self.fail(e)),
        };

        let session = match Session::build(&spec, granted, &self.config) {
            Ok(session) => session,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.transition(SessionPhase::Ready)?;
        tracing::info!(
            scope = %self.scope,
            nodes = session.tree().len(),
            granted = session.selection().len(),
            stale = session.stale_grants().len(),
            "Session ready"
        );
        Ok(self.session.insert(session))
    }

    /// Flip a node's grant with subtree cascade
    ///
    /// # Errors
    /// - [`AuthzError::SessionNotEditable`] without a session or after submit
    /// - [`AuthzError::UnknownNode`] for ids outside the tree
    pub fn toggle(&mut self, id: &str) -> Result<GrantChange, AuthzError> {
        self.editable_session()?.selection.toggle(id)
    }

    /// Flip a node's expansion
    ///
    /// # Errors
    /// - [`AuthzError::SessionNotEditable`] without a session
    /// - [`AuthzError::UnknownNode`] for ids outside the tree
    pub fn toggle_expand(&mut self, id: &str) -> Result<bool, AuthzError> {
        self.expansion_mut()?.toggle_expand(id)
    }

    /// Expansion of the loaded session
    ///
    /// # Errors
    /// Returns [`AuthzError::SessionNotEditable`] without a session.
    pub fn expansion_mut(&mut self) -> Result<&mut ExpansionState, AuthzError> {
        let phase = self.phase;
        self.session
            .as_mut()
            .map(|s| &mut s.expansion)
            .ok_or(AuthzError::SessionNotEditable { phase })
    }

    /// Encode the selection and save it under the session scope
    ///
    /// On failure the selection is kept so the caller can retry without
    /// reloading. The encoding is tree pre-order, so a retry of an unchanged
    /// selection sends an identical list.
    ///
    /// # Errors
    /// - [`AuthzError::GrantSubmit`] when the save fails or times out
    /// - [`AuthzError::IllegalTransition`] outside `Ready`/`Failed` and an
    ///   abandoned `Submitting`
    /// - [`AuthzError::SessionNotEditable`] after a failed load
    pub async fn submit(&mut self) -> Result<SubmitReceipt, AuthzError> {
        validate_transition(self.phase, SessionPhase::Submitting)?;
        if self.phase == SessionPhase::Submitting {
            tracing::warn!(scope = %self.scope, "Restarting abandoned submit");
        }
        let Some(session) = self.session.as_ref() else {
            return Err(AuthzError::SessionNotEditable { phase: self.phase });
        };
        let granted = session.selection.encode();

        self.transition(SessionPhase::Submitting)?;
        tracing::info!(scope = %self.scope, granted = granted.len(), "Submitting grants");

        let store = Arc::clone(&self.grant_store);
        let saved = with_timeout(
            self.config.submit_timeout(),
            store.save_granted(&self.scope, &granted),
        )
        .await;

        match saved {
            Ok(()) => {
                self.transition(SessionPhase::Done)?;
                tracing::info!(scope = %self.scope, "Grants saved");
                Ok(SubmitReceipt {
                    scope: self.scope.clone(),
                    granted,
                })
            }
            Err(source) => {
                let err = AuthzError::GrantSubmit {
                    scope: self.scope.clone(),
                    source,
                };
                Err(self.fail(err))
            }
        }
    }

    /// Discard the session and return to `Idle`
    pub fn close(&mut self) {
        self.session = None;
        if let Err(e) = self.transition(SessionPhase::Idle) {
            tracing::error!(error = %e, "Close rejected by phase table");
        }
    }

    fn editable_session(&mut self) -> Result<&mut Session, AuthzError> {
        match (self.phase, self.session.as_mut()) {
            (SessionPhase::Ready | SessionPhase::Failed, Some(session)) => Ok(session),
            (phase, _) => Err(AuthzError::SessionNotEditable { phase }),
        }
    }

    fn transition(&mut self, to: SessionPhase) -> Result<(), AuthzError> {
        validate_transition(self.phase, to)?;
        tracing::debug!(scope = %self.scope, from = ?self.phase, ?to, "Phase transition");
        self.phase = to;
        Ok(())
    }

    fn fail(&mut self, err: AuthzError) -> AuthzError {
        tracing::error!(scope = %self.scope, phase = ?self.phase, error = %err, "Session operation failed");
        match self.transition(SessionPhase::Failed) {
            Ok(()) => err,
            Err(transition) => transition,
        }
    }
}

async fn fetch_tree(
    source: Arc<dyn TreeSource>,
    scope: ScopeKey,
    limit: Option<Duration>,
) -> Result<TreeSpec, AuthzError> {
    let fetched = with_timeout(limit, source.fetch_tree(&scope)).await;
    fetched.map_err(|source| AuthzError::TreeLoad { scope, source })
}

async fn fetch_granted(
    store: Arc<dyn GrantStore>,
    scope: ScopeKey,
    limit: Option<Duration>,
) -> Result<Vec<NodeId>, AuthzError> {
    let fetched = with_timeout(limit, store.fetch_granted(&scope)).await;
    fetched.map_err(|source| AuthzError::GrantLoad { scope, source })
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T, PortError>>,
) -> Result<T, PortError> {
    match limit {
        None => fut.await,
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .unwrap_or_else(|_| {
                Err(PortError::Timeout {
                    after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockGrantStore, MockTreeSource};
    use crate::types::NodeSpec;

    fn abcd() -> TreeSpec {
        TreeSpec::Nested(vec![NodeSpec::branch(
            "A",
            vec![
                NodeSpec::leaf("B"),
                NodeSpec::branch("C", vec![NodeSpec::leaf("D")]),
            ],
        )])
    }

    fn tree_ok() -> MockTreeSource {
        let mut source = MockTreeSource::new();
        source.expect_fetch_tree().returning(|_| Ok(abcd()));
        source
    }

    fn grants_ok(ids: &'static [&'static str]) -> MockGrantStore {
        let mut store = MockGrantStore::new();
        store
            .expect_fetch_granted()
            .returning(move |_| Ok(ids.iter().map(|s| NodeId::from(*s)).collect()));
        store
    }

    fn coordinator(source: MockTreeSource, store: MockGrantStore) -> SyncCoordinator {
        SyncCoordinator::new(
            "pkg-1",
            Arc::new(source),
            Arc::new(store),
            SessionConfig::new(),
        )
    }

    #[tokio::test]
    async fn load_seeds_selection() {
        let mut coa = coordinator(tree_ok(), grants_ok(&["B"]));
        let session = coa.load().await.unwrap();

        assert_eq!(session.tree().len(), 4);
        assert!(session.selection().is_granted("B"));
        assert_eq!(session.selection().len(), 1);
        assert!(session.expansion().is_expanded("C"));
        assert_eq!(coa.phase(), SessionPhase::Ready);
    }

    #[tokio::test]
    async fn grant_failure_fails_load() {
        let mut store = MockGrantStore::new();
        store
            .expect_fetch_granted()
            .returning(|_| Err(PortError::unavailable("down")));
        let mut coa = coordinator(tree_ok(), store);

        let err = coa.load().await.unwrap_err();
        assert!(matches!(err, AuthzError::GrantLoad { .. }));
        assert_eq!(coa.phase(), SessionPhase::Failed);
        assert!(coa.session().is_none());
    }

    #[tokio::test]
    async fn tree_failure_fails_load() {
        let mut source = MockTreeSource::new();
        source
            .expect_fetch_tree()
            .returning(|_| Err(PortError::NotFound(ScopeKey::from("pkg-1"))));
        let mut coa = coordinator(source, grants_ok(&[]));

        let err = coa.load().await.unwrap_err();
        assert_eq!(
            err.port_error(),
            Some(&PortError::NotFound(ScopeKey::from("pkg-1")))
        );
        assert_eq!(coa.phase(), SessionPhase::Failed);
    }

    #[tokio::test]
    async fn malformed_tree_fails_load() {
        let mut source = MockTreeSource::new();
        source.expect_fetch_tree().returning(|_| {
            Ok(TreeSpec::Nested(vec![NodeSpec::leaf("A"), NodeSpec::leaf("A")]))
        });
        let mut coa = coordinator(source, grants_ok(&[]));

        let err = coa.load().await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(coa.phase(), SessionPhase::Failed);
    }

    #[tokio::test]
    async fn submit_sends_preorder_encoding() {
        let mut store = grants_ok(&[]);
        store
            .expect_save_granted()
            .withf(|scope, granted| {
                scope.as_str() == "pkg-1"
                    && granted.to_vec() == vec![NodeId::from("C"), NodeId::from("D")]
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let mut coa = coordinator(tree_ok(), store);

        coa.load().await.unwrap();
        coa.toggle("D").unwrap();
        coa.toggle("C").unwrap();
        let receipt = coa.submit().await.unwrap();

        assert_eq!(receipt.granted, vec![NodeId::from("C"), NodeId::from("D")]);
        assert_eq!(coa.phase(), SessionPhase::Done);
    }

    #[tokio::test]
    async fn submit_failure_keeps_selection() {
        let mut store = grants_ok(&["B"]);
        store
            .expect_save_granted()
            .returning(|_, _| Err(PortError::rejected("conflict")));
        let mut coa = coordinator(tree_ok(), store);

        coa.load().await.unwrap();
        coa.toggle("C").unwrap();
        let err = coa.submit().await.unwrap_err();

        assert!(matches!(err, AuthzError::GrantSubmit { .. }));
        assert!(err.is_retryable());
        assert_eq!(coa.phase(), SessionPhase::Failed);
        let selection = coa.session().unwrap().selection();
        assert!(selection.contains_all(["B", "C", "D"]));
    }

    #[tokio::test]
    async fn edits_rejected_without_session() {
        let mut coa = coordinator(MockTreeSource::new(), MockGrantStore::new());

        assert!(matches!(
            coa.toggle("A"),
            Err(AuthzError::SessionNotEditable {
                phase: SessionPhase::Idle
            })
        ));
        assert!(matches!(
            coa.submit().await,
            Err(AuthzError::IllegalTransition(_))
        ));
    }

    #[tokio::test]
    async fn submit_after_failed_load_is_rejected() {
        let mut source = MockTreeSource::new();
        source
            .expect_fetch_tree()
            .returning(|_| Err(PortError::unavailable("down")));
        let mut coa = coordinator(source, grants_ok(&[]));
        let _ = coa.load().await;

        assert!(matches!(
            coa.submit().await,
            Err(AuthzError::SessionNotEditable {
                phase: SessionPhase::Failed
            })
        ));
    }

    #[tokio::test]
    async fn close_discards_session() {
        let mut coa = coordinator(tree_ok(), grants_ok(&["A"]));
        coa.load().await.unwrap();
        coa.close();

        assert_eq!(coa.phase(), SessionPhase::Idle);
        assert!(coa.session().is_none());
    }
}
