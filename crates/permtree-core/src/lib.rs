//! permtree core - hierarchical authorization over grant trees
//!
//! Given a tree of menus, pages and actions, the crate:
//! - Builds an immutable [`TreeModel`] and its [`DescendantIndex`]
//! - Keeps the granted ids in a [`SelectionState`] with subtree cascade
//! - Tracks rendered expansion separately in an [`ExpansionState`]
//! - Loads and submits grants through a [`SyncCoordinator`]
//!
//! # Architecture
//!
//! ```text
//!  TreeSource ──fetch_tree──┐
//!                           ├─ join ─→ TreeModel → DescendantIndex
//!  GrantStore ─fetch_granted┘              │
//!      ↑                                   ↓
//!      └──────── save_granted ←── SelectionState.encode()
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use permtree_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(source: Arc<dyn TreeSource>, store: Arc<dyn GrantStore>)
//! #     -> Result<(), AuthzError> {
//! let mut session = SyncCoordinator::new("package-42", source, store, SessionConfig::new());
//! session.load().await?;
//! session.toggle("menu.orders")?;
//! let receipt = session.submit().await?;
//! println!("saved {} grants", receipt.granted.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod coordinator;
pub mod error;
pub mod expansion;
pub mod index;
pub mod ports;
pub mod selection;
pub mod state_machine;
pub mod tree;
pub mod types;

// Re-exports for convenience
pub use coordinator::{CancelHandle, Session, SubmitReceipt, SyncCoordinator};
pub use error::{AuthzError, MalformedTreeError, PortError, TransitionError};
pub use expansion::ExpansionState;
pub use index::DescendantIndex;
pub use ports::{GrantStore, TreeSource};
pub use selection::{Coverage, GrantChange, SelectionState};
pub use state_machine::{allowed_transitions, validate_transition, SessionPhase};
pub use tree::{Node, TreeModel};
pub use types::{FlatNodeSpec, NodeId, NodeSpec, ScopeKey, SessionConfig, TreeLimits, TreeSpec};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with permtree
    pub use crate::{
        AuthzError, Coverage, GrantChange, GrantStore, NodeId, NodeSpec, ScopeKey, SessionConfig,
        SessionPhase, SyncCoordinator, TreeSource, TreeSpec,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
