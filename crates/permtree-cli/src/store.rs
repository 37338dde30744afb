//! JSON file collaborators
//!
//! Layout under the data directory:
//!
//! ```text
//! <data-dir>/trees/<scope>.json    TreeSpec
//! <data-dir>/grants/<scope>.json   ["id", ...]
//! ```

use async_trait::async_trait;
use permtree_core::{GrantStore, NodeId, PortError, ScopeKey, TreeSource, TreeSpec};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Tree Source and Grant Store over one data directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the tree description for a scope
    ///
    /// # Errors
    /// Returns [`PortError::Rejected`] if the scope is not a plain file name.
    pub fn tree_path(&self, scope: &ScopeKey) -> Result<PathBuf, PortError> {
        Ok(self.root.join("trees").join(file_name(scope)?))
    }

    /// Path of the grant list for a scope
    ///
    /// # Errors
    /// Returns [`PortError::Rejected`] if the scope is not a plain file name.
    pub fn grants_path(&self, scope: &ScopeKey) -> Result<PathBuf, PortError> {
        Ok(self.root.join("grants").join(file_name(scope)?))
    }
}

fn file_name(scope: &ScopeKey) -> Result<String, PortError> {
    let key = scope.as_str();
    if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
        return Err(PortError::rejected(format!("invalid scope key: {key:?}")));
    }
    Ok(format!("{key}.json"))
}

fn io_error(path: &Path, err: &std::io::Error) -> PortError {
    PortError::unavailable(format!("{}: {err}", path.display()))
}

#[async_trait]
impl TreeSource for FileStore {
    async fn fetch_tree(&self, scope: &ScopeKey) -> Result<TreeSpec, PortError> {
        let path = self.tree_path(scope)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PortError::NotFound(scope.clone()));
            }
            Err(e) => return Err(io_error(&path, &e)),
        };
        serde_json::from_slice(&raw)
            .map_err(|e| PortError::rejected(format!("{}: {e}", path.display())))
    }
}

#[async_trait]
impl GrantStore for FileStore {
    async fn fetch_granted(&self, scope: &ScopeKey) -> Result<Vec<NodeId>, PortError> {
        let path = self.grants_path(scope)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No grant file, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(io_error(&path, &e)),
        };
        serde_json::from_slice(&raw)
            .map_err(|e| PortError::rejected(format!("{}: {e}", path.display())))
    }

    async fn save_granted(&self, scope: &ScopeKey, granted: &[NodeId]) -> Result<(), PortError> {
        let path = self.grants_path(scope)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| io_error(dir, &e))?;
        }

        let body = serde_json::to_vec_pretty(granted)
            .map_err(|e| PortError::rejected(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| io_error(&tmp, &e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&path, &e))?;

        tracing::debug!(path = %path.display(), count = granted.len(), "Wrote grant file");
        Ok(())
    }
}
